#![forbid(unsafe_code)]

//! Error type shared by every sequence, channel and reactive object.
//!
//! Observer failures are values: a callback returns `Err`, the sequence
//! stops delivering the current item, and the error travels back to whoever
//! published it. A [`Fault`] is reference-counted so that the *same* failure
//! can be recognised after it has been routed through an exception sink.

use std::fmt;
use std::sync::Arc;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by sequences, reactive objects and binders.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A subscriber or callback failed.
    #[error(transparent)]
    Fault(#[from] Fault),
    /// A property change was raised without a property name.
    #[error("a property name is required")]
    MissingPropertyName,
    /// The target was used after being disposed.
    #[error("the target has been disposed")]
    Disposed,
}

impl Error {
    /// Shorthand for a fault carrying a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Fault(Fault::msg(message))
    }

    /// The underlying fault, if this is an observer failure.
    #[must_use]
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether both errors carry the very same fault instance.
    #[must_use]
    pub fn same_fault(&self, other: &Error) -> bool {
        match (self.as_fault(), other.as_fault()) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// A shared, cloneable failure raised by user code.
#[derive(Clone)]
pub struct Fault {
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl Fault {
    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(error),
        }
    }

    /// Build a fault from a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Identity comparison: true only for clones of one fault.
    #[must_use]
    pub fn ptr_eq(&self, other: &Fault) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }

    /// Borrow the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fault").field(&self.source).finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}
