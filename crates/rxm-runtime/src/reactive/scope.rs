#![forbid(unsafe_code)]

//! Lifetime management for groups of subscriptions.

use rxm_core::{Observable, ObservableExt, Result, Subscription};

/// Owns the subscriptions of one ViewModel, binder or property.
///
/// Dropping the scope (or calling [`clear`](Self::clear)) unsubscribes
/// everything it holds, newest first.
///
/// ```ignore
/// let mut scope = BindingScope::new();
/// scope.subscribe(&rx.changed(), |event| println!("{event:?}"));
/// ```
///
/// # Invariants
///
/// 1. Teardown order is the reverse of registration order.
/// 2. Once the scope is dropped none of its callbacks run again.
/// 3. A cleared scope accepts new subscriptions.
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe `callback` to `source` and hold the subscription. Chains.
    pub fn subscribe<T: 'static>(
        &mut self,
        source: &impl Observable<T>,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> &mut Self {
        let sub = source.subscribe_next(callback);
        self.subscriptions.push(sub);
        self
    }

    /// Subscribe a fallible `callback` to `source` within this scope.
    pub fn try_subscribe<T: 'static>(
        &mut self,
        source: &impl Observable<T>,
        callback: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let sub = source.try_subscribe_next(callback);
        self.subscriptions.push(sub);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release all subscriptions, newest first. The scope stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            sub.unsubscribe();
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
