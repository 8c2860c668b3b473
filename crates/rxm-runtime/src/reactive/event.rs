#![forbid(unsafe_code)]

//! Property change records and sender identity.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a reactive object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A changing or changed notification: which property, raised by whom.
///
/// A missing property name means every property of the sender changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyEvent {
    property_name: Option<Arc<str>>,
    sender: ObjectId,
}

impl PropertyEvent {
    /// Event for `property_name` raised by `sender`.
    #[must_use]
    pub fn new(property_name: Option<Arc<str>>, sender: ObjectId) -> Self {
        Self {
            property_name,
            sender,
        }
    }

    /// Name of the property, or `None` for "all properties".
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    /// Object that raised the event.
    #[must_use]
    pub fn sender(&self) -> ObjectId {
        self.sender
    }

    /// Whether the event covers every property.
    #[must_use]
    pub fn is_all_properties(&self) -> bool {
        self.property_name.is_none()
    }

    /// Whether a listener for `name` should react to this event.
    #[must_use]
    pub fn affects(&self, name: &str) -> bool {
        self.property_name().is_none_or(|own| own == name)
    }

    pub(crate) fn key(&self) -> &Option<Arc<str>> {
        &self.property_name
    }
}
