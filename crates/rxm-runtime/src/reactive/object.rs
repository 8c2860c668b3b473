#![forbid(unsafe_code)]

//! Reactive objects: changing/changed channels with suppression, delay and
//! exception funneling.
//!
//! An [`RxObject`] is composed into a ViewModel and driven from its setters:
//!
//! ```ignore
//! struct Person {
//!     rx: RxObject,
//!     name: String,
//! }
//!
//! impl Person {
//!     fn set_name(&mut self, name: String) -> Result<bool> {
//!         self.rx.raise_and_set_if_changed(&mut self.name, name, "name")
//!     }
//! }
//! ```
//!
//! # Invariants
//!
//! 1. For one property set, every changing observer runs before any changed
//!    observer.
//! 2. While a [`SuppressGuard`] is alive nothing is delivered or buffered.
//! 3. While a [`DelayGuard`] is alive events are buffered; when the last one
//!    is released the deduplicated changing batch is delivered, then the
//!    deduplicated changed batch.
//! 4. Notification state and the exception channel are allocated on first
//!    use.
//!
//! # Failure Modes
//!
//! - An observer failure is returned to the raising caller, unless
//!   [`RxObject::thrown_exceptions`] has been called at least once; from then
//!   on failures are published on that channel instead.
//! - A flush delivers every buffered event even if some fail, and reports the
//!   first failure. Dropping a [`DelayGuard`] without
//!   [`release`](DelayGuard::release) logs that failure.

use std::sync::{Arc, OnceLock, Weak};

use rxm_core::{
    BoxObservable, Error, ImmediateScheduler, ObservableExt, Observer, Result, ScopedPublisher,
    Subject, Subscription,
};

use super::event::{ObjectId, PropertyEvent};
use super::notifications::{ChangeKind, Flush, NotificationState};
use super::scope::BindingScope;
use crate::registration::Registration;

struct RxInner {
    id: ObjectId,
    notifications: OnceLock<NotificationState>,
    changing: Subject<PropertyEvent>,
    changed: Subject<PropertyEvent>,
    thrown: OnceLock<ScopedPublisher<Error>>,
    registration: Registration,
}

/// Change-notification core of a ViewModel. Cloning yields another handle to
/// the same object.
#[derive(Clone)]
pub struct RxObject {
    inner: Arc<RxInner>,
}

/// Non-owning handle to an [`RxObject`], for use inside callbacks.
#[derive(Clone)]
pub struct WeakRxObject {
    inner: Weak<RxInner>,
}

impl WeakRxObject {
    /// The object, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RxObject> {
        self.inner.upgrade().map(|inner| RxObject { inner })
    }
}

impl std::fmt::Debug for WeakRxObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRxObject")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Default for RxObject {
    fn default() -> Self {
        Self::new()
    }
}

impl RxObject {
    /// Object using the default [`Registration`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_registration(Registration::default())
    }

    /// Object using `registration` for its exception sink.
    #[must_use]
    pub fn with_registration(registration: Registration) -> Self {
        Self {
            inner: Arc::new(RxInner {
                id: ObjectId::next(),
                notifications: OnceLock::new(),
                changing: Subject::new(),
                changed: Subject::new(),
                thrown: OnceLock::new(),
                registration,
            }),
        }
    }

    /// Identity used as the sender of every event this object raises.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakRxObject {
        WeakRxObject {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The registration this object was built with.
    #[must_use]
    pub fn registration(&self) -> &Registration {
        &self.inner.registration
    }

    /// Whether both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &RxObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn state(&self) -> &NotificationState {
        self.inner.notifications.get_or_init(NotificationState::new)
    }

    // -----------------------------------------------------------------------
    // Channels
    // -----------------------------------------------------------------------

    /// Events raised before a property changes.
    #[must_use]
    pub fn changing(&self) -> BoxObservable<PropertyEvent> {
        Arc::new(self.inner.changing.clone())
    }

    /// Events raised after a property changed.
    #[must_use]
    pub fn changed(&self) -> BoxObservable<PropertyEvent> {
        Arc::new(self.inner.changed.clone())
    }

    /// Changed events that concern `name`, including "all properties" events.
    #[must_use]
    pub fn when_property_changed(&self, name: &str) -> BoxObservable<PropertyEvent> {
        let name: Arc<str> = Arc::from(name);
        self.inner
            .changed
            .clone()
            .filter(move |event: &PropertyEvent| event.affects(&name))
            .boxed()
    }

    /// Failures raised by change observers.
    ///
    /// The first call switches the object from returning observer failures
    /// to publishing them here. While nobody subscribes, published failures
    /// go to the registration's exception handler.
    #[must_use]
    pub fn thrown_exceptions(&self) -> BoxObservable<Error> {
        Arc::new(self.exception_sink().clone())
    }

    fn exception_sink(&self) -> &ScopedPublisher<Error> {
        self.inner.thrown.get_or_init(|| {
            tracing::debug!(message = "exceptions.sink.materialized", object = %self.inner.id);
            ScopedPublisher::with_default_sink(
                ImmediateScheduler::shared(),
                self.inner.registration.exception_handler.clone(),
            )
        })
    }

    // -----------------------------------------------------------------------
    // Suppression / delay
    // -----------------------------------------------------------------------

    /// Drop every notification until the returned guard is released.
    /// Scopes nest.
    pub fn suppress_change_notifications(&self) -> SuppressGuard {
        self.state().begin_suppress();
        SuppressGuard {
            object: self.clone(),
        }
    }

    /// Buffer notifications until the returned guard (and every enclosing
    /// delay guard) is released.
    pub fn delay_change_notifications(&self) -> DelayGuard {
        self.state().begin_delay();
        DelayGuard {
            object: Some(self.clone()),
        }
    }

    /// Whether no suppression scope is open.
    #[must_use]
    pub fn are_change_notifications_enabled(&self) -> bool {
        self.inner
            .notifications
            .get()
            .is_none_or(NotificationState::are_enabled)
    }

    /// Whether a delay scope is open.
    #[must_use]
    pub fn are_change_notifications_delayed(&self) -> bool {
        self.inner
            .notifications
            .get()
            .is_some_and(NotificationState::are_delayed)
    }

    fn end_delay(&self) -> Result<()> {
        match self.state().end_delay() {
            Some(flush) => self.flush(flush),
            None => Ok(()),
        }
    }

    fn flush(&self, flush: Flush) -> Result<()> {
        if flush.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            message = "notifications.flush",
            object = %self.inner.id,
            changing = flush.changing.len(),
            changed = flush.changed.len()
        );
        let mut first = None;
        for event in &flush.changing {
            if let Err(error) = self.deliver(ChangeKind::Changing, event) {
                first.get_or_insert(error);
            }
        }
        for event in &flush.changed {
            if let Err(error) = self.deliver(ChangeKind::Changed, event) {
                first.get_or_insert(error);
            }
        }
        first.map_or(Ok(()), Err)
    }

    // -----------------------------------------------------------------------
    // Raising
    // -----------------------------------------------------------------------

    /// Announce that `name` is about to change.
    pub fn raise_property_changing(&self, name: &str) -> Result<()> {
        self.raise(ChangeKind::Changing, Some(property_name(name)?))
    }

    /// Announce that `name` changed.
    pub fn raise_property_changed(&self, name: &str) -> Result<()> {
        self.raise(ChangeKind::Changed, Some(property_name(name)?))
    }

    /// Announce that every property is about to change, then that every
    /// property changed.
    pub fn raise_all_properties_changed(&self) -> Result<()> {
        self.raise(ChangeKind::Changing, None)?;
        self.raise(ChangeKind::Changed, None)
    }

    /// Assign `value` to `field` when they differ, surrounded by changing and
    /// changed notifications for `name`. Returns whether anything changed.
    pub fn raise_and_set_if_changed<T: PartialEq>(
        &self,
        field: &mut T,
        value: T,
        name: &str,
    ) -> Result<bool> {
        let name = property_name(name)?;
        if *field == value {
            return Ok(false);
        }
        self.raise(ChangeKind::Changing, Some(Arc::clone(&name)))?;
        *field = value;
        self.raise(ChangeKind::Changed, Some(name))?;
        Ok(true)
    }

    fn raise(&self, kind: ChangeKind, name: Option<Arc<str>>) -> Result<()> {
        let event = PropertyEvent::new(name, self.inner.id);
        match self.state().admit(kind, event) {
            Some(event) => self.deliver(kind, &event),
            None => Ok(()),
        }
    }

    /// Invoke one channel inside the failure boundary.
    fn deliver(&self, kind: ChangeKind, event: &PropertyEvent) -> Result<()> {
        let channel = match kind {
            ChangeKind::Changing => &self.inner.changing,
            ChangeKind::Changed => &self.inner.changed,
        };
        let Err(error) = channel.on_next(event) else {
            return Ok(());
        };
        match self.inner.thrown.get() {
            Some(sink) => {
                tracing::debug!(
                    message = "exceptions.routed",
                    object = %self.inner.id,
                    property = event.property_name()
                );
                sink.publish(&error)
            }
            None => Err(error),
        }
    }
}

fn property_name(name: &str) -> Result<Arc<str>> {
    if name.is_empty() {
        return Err(Error::MissingPropertyName);
    }
    Ok(Arc::from(name))
}

impl std::fmt::Debug for RxObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxObject")
            .field("id", &self.inner.id)
            .field("enabled", &self.are_change_notifications_enabled())
            .field("delayed", &self.are_change_notifications_delayed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Suppression scope. Dropping it re-enables notifications (once every
/// other open suppression scope is gone too).
#[must_use = "dropping this guard ends the suppression scope"]
pub struct SuppressGuard {
    object: RxObject,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.object.state().end_suppress();
    }
}

impl std::fmt::Debug for SuppressGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressGuard")
            .field("object", &self.object.id())
            .finish()
    }
}

/// Delay scope. Releasing the outermost one flushes the buffered events.
#[must_use = "dropping this guard ends the delay scope and flushes"]
pub struct DelayGuard {
    object: Option<RxObject>,
}

impl DelayGuard {
    /// End the scope and report the flush result.
    pub fn release(mut self) -> Result<()> {
        match self.object.take() {
            Some(object) => object.end_delay(),
            None => Ok(()),
        }
    }
}

impl Drop for DelayGuard {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };
        if let Err(error) = object.end_delay() {
            tracing::warn!(
                message = "notifications.flush.failed",
                object = %object.id(),
                error = %error
            );
        }
    }
}

impl std::fmt::Debug for DelayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayGuard")
            .field("object", &self.object.as_ref().map(RxObject::id))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// Anything that owns an [`RxObject`] gets its notification surface.
pub trait Reactive {
    /// The composed reactive core.
    fn rx(&self) -> &RxObject;

    /// See [`RxObject::changing`].
    fn changing(&self) -> BoxObservable<PropertyEvent> {
        self.rx().changing()
    }

    /// See [`RxObject::changed`].
    fn changed(&self) -> BoxObservable<PropertyEvent> {
        self.rx().changed()
    }

    /// See [`RxObject::thrown_exceptions`].
    fn thrown_exceptions(&self) -> BoxObservable<Error> {
        self.rx().thrown_exceptions()
    }

    /// See [`RxObject::suppress_change_notifications`].
    fn suppress_change_notifications(&self) -> SuppressGuard {
        self.rx().suppress_change_notifications()
    }

    /// See [`RxObject::delay_change_notifications`].
    fn delay_change_notifications(&self) -> DelayGuard {
        self.rx().delay_change_notifications()
    }

    /// See [`RxObject::raise_property_changing`].
    fn raise_property_changing(&self, name: &str) -> Result<()> {
        self.rx().raise_property_changing(name)
    }

    /// See [`RxObject::raise_property_changed`].
    fn raise_property_changed(&self, name: &str) -> Result<()> {
        self.rx().raise_property_changed(name)
    }
}

impl Reactive for RxObject {
    fn rx(&self) -> &RxObject {
        self
    }
}

// ---------------------------------------------------------------------------
// RxDisposableObject
// ---------------------------------------------------------------------------

/// [`RxObject`] that also owns subscriptions, released on [`dispose`] or
/// drop.
///
/// [`dispose`]: RxDisposableObject::dispose
pub struct RxDisposableObject {
    rx: RxObject,
    scope: std::sync::Mutex<Option<BindingScope>>,
}

impl Default for RxDisposableObject {
    fn default() -> Self {
        Self::new()
    }
}

impl RxDisposableObject {
    /// Object using the default [`Registration`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_registration(Registration::default())
    }

    /// Object using `registration`.
    #[must_use]
    pub fn with_registration(registration: Registration) -> Self {
        Self {
            rx: RxObject::with_registration(registration),
            scope: std::sync::Mutex::new(Some(BindingScope::new())),
        }
    }

    /// Keep `subscription` alive until disposal. After disposal it is
    /// released immediately.
    pub fn track(&self, subscription: Subscription) {
        let mut scope = rxm_core::sync::lock(&self.scope);
        if let Some(scope) = scope.as_mut() {
            scope.hold(subscription);
            return;
        }
        drop(scope);
        subscription.unsubscribe();
    }

    /// Release every tracked subscription.
    pub fn dispose(&self) {
        let scope = rxm_core::sync::lock(&self.scope).take();
        if let Some(scope) = scope {
            tracing::debug!(
                message = "object.disposed",
                object = %self.rx.id(),
                subscriptions = scope.binding_count()
            );
            drop(scope);
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        rxm_core::sync::lock(&self.scope).is_none()
    }
}

impl Reactive for RxDisposableObject {
    fn rx(&self) -> &RxObject {
        &self.rx
    }
}

impl std::fmt::Debug for RxDisposableObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxDisposableObject")
            .field("rx", &self.rx)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(source: &BoxObservable<PropertyEvent>) -> (Arc<Mutex<Vec<String>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = source.subscribe_next(move |e: &PropertyEvent| {
            s.lock()
                .unwrap()
                .push(e.property_name().unwrap_or("*").to_owned());
        });
        (seen, sub)
    }

    #[test]
    fn empty_name_is_rejected() {
        let rx = RxObject::new();
        assert!(matches!(
            rx.raise_property_changed(""),
            Err(Error::MissingPropertyName)
        ));
        let mut field = 0;
        assert!(matches!(
            rx.raise_and_set_if_changed(&mut field, 1, ""),
            Err(Error::MissingPropertyName)
        ));
        assert_eq!(field, 0);
    }

    #[test]
    fn equal_value_is_a_no_op() {
        let rx = RxObject::new();
        let (seen, _sub) = record(&rx.changed());
        let mut field = 5;
        assert!(!rx.raise_and_set_if_changed(&mut field, 5, "n").unwrap());
        assert!(rx.raise_and_set_if_changed(&mut field, 6, "n").unwrap());
        assert_eq!(*seen.lock().unwrap(), vec!["n"]);
    }

    #[test]
    fn all_properties_event_has_no_name() {
        let rx = RxObject::new();
        let (changing, _a) = record(&rx.changing());
        let (changed, _b) = record(&rx.changed());
        rx.raise_all_properties_changed().unwrap();
        assert_eq!(*changing.lock().unwrap(), vec!["*"]);
        assert_eq!(*changed.lock().unwrap(), vec!["*"]);
    }

    #[test]
    fn when_property_changed_filters_by_name() {
        let rx = RxObject::new();
        let (seen, _sub) = record(&rx.when_property_changed("a"));
        rx.raise_property_changed("a").unwrap();
        rx.raise_property_changed("b").unwrap();
        rx.raise_all_properties_changed().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a", "*"]);
    }

    #[test]
    fn state_is_lazy() {
        let rx = RxObject::new();
        assert!(rx.are_change_notifications_enabled());
        assert!(!rx.are_change_notifications_delayed());
        assert!(rx.inner.notifications.get().is_none());
        rx.raise_property_changed("x").unwrap();
        assert!(rx.inner.notifications.get().is_some());
    }

    #[test]
    fn delay_guard_release_reports_flush_failure() {
        let rx = RxObject::new();
        let _sub = rx
            .changed()
            .try_subscribe_next(|_| Err(Error::msg("observer failed")));
        let guard = rx.delay_change_notifications();
        rx.raise_property_changed("a").unwrap();
        let err = guard.release().unwrap_err();
        assert_eq!(err.to_string(), "observer failed");
    }

    #[test]
    fn weak_handle_does_not_keep_object_alive() {
        let rx = RxObject::new();
        let weak = rx.downgrade();
        assert!(weak.upgrade().is_some_and(|o| o.ptr_eq(&rx)));
        drop(rx);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn disposable_object_releases_tracked_subscriptions() {
        let owner = RxDisposableObject::new();
        let source = RxObject::new();
        let (seen, sub) = record(&source.changed());
        owner.track(sub);
        source.raise_property_changed("a").unwrap();
        owner.dispose();
        source.raise_property_changed("b").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
        assert!(owner.is_disposed());
    }
}
