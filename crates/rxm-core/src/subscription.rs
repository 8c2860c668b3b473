#![forbid(unsafe_code)]

//! RAII subscription handles.
//!
//! # Invariants
//!
//! 1. The teardown runs at most once, whether through [`Subscription::unsubscribe`]
//!    or `Drop`.
//! 2. [`Subscription::detach`] disarms the teardown; the underlying
//!    registration then lives as long as its source.
//! 3. A merged subscription tears its parts down in reverse order.

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a live registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when released.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Combine several subscriptions into one; released last-to-first.
    pub fn merge(parts: impl IntoIterator<Item = Subscription>) -> Self {
        let mut parts: Vec<Subscription> = parts.into_iter().collect();
        if parts.is_empty() {
            return Self::empty();
        }
        Self::new(move || {
            while let Some(part) = parts.pop() {
                drop(part);
            }
        })
    }

    /// Release the registration now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Whether the teardown has already run (or was never armed).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.teardown.is_none()
    }

    /// Keep the registration alive for the lifetime of its source.
    pub fn detach(mut self) {
        self.teardown = None;
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
