#![forbid(unsafe_code)]

//! A standalone observable value with validation.
//!
//! [`ReactiveProperty`] owns its value, pushes every change to subscribers,
//! raises `"value"` / `"has_errors"` / `"error_message"` property events on
//! its own [`RxObject`], and keeps an error list computed by validators.
//!
//! Validators come in two shapes:
//!
//! - plain functions `Fn(&T) -> Option<String>`, run on every set, refresh
//!   and [`check_validation`](ReactiveProperty::check_validation);
//! - stream validators, built from the property's value stream and producing
//!   `Option<String>` items whenever they like (for instance after a
//!   scheduler hop).
//!
//! The error list is the plain validators' messages, in registration order,
//! followed by the latest message of each stream validator.
//!
//! # Invariants
//!
//! 1. The error channel emits only when the error list actually changes.
//! 2. `"has_errors"` is raised only when the list flips between empty and
//!    non-empty; `"error_message"` on every change.
//! 3. After [`dispose`](ReactiveProperty::dispose) every channel has
//!    completed and `set_value` fails with [`Error::Disposed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use rxm_core::sync::lock;
use rxm_core::{
    BehaviorSubject, BoxObservable, Error, Observable, ObservableExt, Observer, Result,
    SharedObserver, Subject, Subscription,
};

use super::event::PropertyEvent;
use super::object::{Reactive, RxObject};
use super::scope::BindingScope;
use crate::registration::Registration;

/// Property name raised when the value changes.
pub const VALUE_PROPERTY: &str = "value";
/// Property name raised when the property gains or loses all errors.
pub const HAS_ERRORS_PROPERTY: &str = "has_errors";
/// Property name raised whenever the error list changes.
pub const ERROR_MESSAGE_PROPERTY: &str = "error_message";

type Validator<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Construction options for [`ReactiveProperty`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactivePropertyOptions {
    /// New subscribers do not receive the current value.
    pub skip_current_value_on_subscribe: bool,
    /// Setting an equal value still notifies.
    pub allow_duplicate_values: bool,
}

struct Validation<T> {
    validators: Vec<Validator<T>>,
    sync_errors: Vec<String>,
    stream_errors: Vec<Option<String>>,
}

impl<T> Validation<T> {
    fn aggregate(&self) -> Vec<String> {
        self.sync_errors
            .iter()
            .chain(self.stream_errors.iter().flatten())
            .cloned()
            .collect()
    }
}

struct PropertyInner<T> {
    value: Mutex<T>,
    options: ReactivePropertyOptions,
    values: Subject<T>,
    rx: RxObject,
    validation: Mutex<Validation<T>>,
    errors: BehaviorSubject<Vec<String>>,
    scope: Mutex<BindingScope>,
    disposed: AtomicBool,
}

impl<T> PropertyInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn run_validators(&self, value: &T) -> Result<()> {
        let validators = lock(&self.validation).validators.clone();
        let messages: Vec<String> = validators.iter().filter_map(|check| check(value)).collect();
        lock(&self.validation).sync_errors = messages;
        self.publish_errors()
    }

    fn set_stream_error(&self, slot: usize, message: Option<String>) -> Result<()> {
        {
            let mut validation = lock(&self.validation);
            match validation.stream_errors.get_mut(slot) {
                Some(entry) => *entry = message,
                None => return Ok(()),
            }
        }
        self.publish_errors()
    }

    fn publish_errors(&self) -> Result<()> {
        let next = lock(&self.validation).aggregate();
        let previous = self.errors.value();
        if previous == next {
            return Ok(());
        }
        tracing::trace!(
            message = "property.errors.changed",
            object = %self.rx.id(),
            errors = next.len()
        );
        self.errors.on_next(&next)?;
        if previous.is_empty() != next.is_empty() {
            self.rx.raise_property_changed(HAS_ERRORS_PROPERTY)?;
        }
        self.rx.raise_property_changed(ERROR_MESSAGE_PROPERTY)
    }
}

/// Receives one stream validator's results.
struct StreamValidationSink<T> {
    inner: Weak<PropertyInner<T>>,
    slot: usize,
}

impl<T> Observer<Option<String>> for StreamValidationSink<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn on_next(&self, message: &Option<String>) -> Result<()> {
        match self.inner.upgrade() {
            Some(inner) => inner.set_stream_error(self.slot, message.clone()),
            None => Ok(()),
        }
    }
}

/// Observable value with validation. Cloning yields another handle to the
/// same property.
pub struct ReactiveProperty<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for ReactiveProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ReactiveProperty<T>
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> ReactiveProperty<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Property holding `initial`, with default options.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_options(initial, ReactivePropertyOptions::default())
    }

    /// Property holding `initial`.
    #[must_use]
    pub fn with_options(initial: T, options: ReactivePropertyOptions) -> Self {
        Self::with_registration(initial, options, Registration::default())
    }

    /// Property whose change events use `registration`.
    #[must_use]
    pub fn with_registration(
        initial: T,
        options: ReactivePropertyOptions,
        registration: Registration,
    ) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                value: Mutex::new(initial),
                options,
                values: Subject::new(),
                rx: RxObject::with_registration(registration),
                validation: Mutex::new(Validation {
                    validators: Vec::new(),
                    sync_errors: Vec::new(),
                    stream_errors: Vec::new(),
                }),
                errors: BehaviorSubject::new(Vec::new()),
                scope: Mutex::new(BindingScope::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Store `value`, notify subscribers, raise `"value"`, then validate.
    ///
    /// Unless duplicates are allowed, an equal value changes nothing.
    pub fn set_value(&self, value: T) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        if !self.inner.options.allow_duplicate_values && *lock(&self.inner.value) == value {
            return Ok(());
        }
        self.inner.rx.raise_property_changing(VALUE_PROPERTY)?;
        *lock(&self.inner.value) = value.clone();
        self.emit(&value)
    }

    /// Re-emit the current value and re-validate it.
    pub fn refresh(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let value = self.value();
        self.emit(&value)
    }

    fn emit(&self, value: &T) -> Result<()> {
        self.inner.values.on_next(value)?;
        self.inner.rx.raise_property_changed(VALUE_PROPERTY)?;
        self.inner.run_validators(value)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Register a validator returning an error message for bad values.
    ///
    /// The current value is checked immediately unless
    /// `ignore_initial_error` is set.
    pub fn add_validation_error(
        &self,
        validator: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
        ignore_initial_error: bool,
    ) -> Result<()> {
        lock(&self.inner.validation)
            .validators
            .push(Arc::new(validator));
        if ignore_initial_error {
            return Ok(());
        }
        self.check_validation()
    }

    /// Register a validator over the value stream.
    ///
    /// `build` receives every value, starting with the current one, and
    /// returns the stream of validation results; `None` means valid.
    pub fn add_stream_validation<F>(&self, build: F)
    where
        F: FnOnce(BoxObservable<T>) -> BoxObservable<Option<String>>,
    {
        let slot = {
            let mut validation = lock(&self.inner.validation);
            validation.stream_errors.push(None);
            validation.stream_errors.len() - 1
        };
        let values = self
            .inner
            .values
            .clone()
            .start_with(self.value())
            .boxed();
        let results = build(values);
        let subscription = results.subscribe(Arc::new(StreamValidationSink {
            inner: Arc::downgrade(&self.inner),
            slot,
        }));
        self.hold(subscription);
    }

    /// Re-run the plain validators against the current value.
    pub fn check_validation(&self) -> Result<()> {
        let value = self.value();
        self.inner.run_validators(&value)
    }

    /// Whether any validator currently reports an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.inner.errors.value().is_empty()
    }

    /// Every current error message.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.inner.errors.value()
    }

    /// The first current error message.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.inner.errors.value().into_iter().next()
    }

    /// The error list: the current one on subscribe, then every change.
    #[must_use]
    pub fn observe_error_changed(&self) -> BoxObservable<Vec<String>> {
        Arc::new(self.inner.errors.clone())
    }

    /// Whether errors exist: the current state on subscribe, then every flip.
    #[must_use]
    pub fn observe_has_errors(&self) -> BoxObservable<bool> {
        self.inner
            .errors
            .clone()
            .map(|errors: &Vec<String>| !errors.is_empty())
            .distinct_until_changed()
            .boxed()
    }

    /// The first error message, re-emitted on every error change.
    #[must_use]
    pub fn observe_validation_errors(&self) -> BoxObservable<Option<String>> {
        self.inner
            .errors
            .clone()
            .map(|errors: &Vec<String>| errors.first().cloned())
            .boxed()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Property events raised by this property.
    #[must_use]
    pub fn property_changed(&self) -> BoxObservable<PropertyEvent> {
        self.inner.rx.changed()
    }

    /// Complete every channel and release stream validators.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(message = "property.disposed", object = %self.inner.rx.id());
        let released = std::mem::take(&mut *lock(&self.inner.scope));
        drop(released);
        for result in [
            self.inner.values.on_completed(),
            self.inner.errors.on_completed(),
        ] {
            if let Err(error) = result {
                tracing::warn!(message = "property.dispose.failed", error = %error);
            }
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn hold(&self, subscription: Subscription) {
        if self.is_disposed() {
            subscription.unsubscribe();
            return;
        }
        lock(&self.inner.scope).hold(subscription);
    }
}

impl<T> Observable<T> for ReactiveProperty<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        if !self.inner.options.skip_current_value_on_subscribe && !self.is_disposed() {
            let current = self.value();
            if let Err(error) = observer.on_next(&current) {
                tracing::warn!(message = "property.replay.failed", error = %error);
            }
        }
        self.inner.values.subscribe(observer)
    }
}

impl<T> Reactive for ReactiveProperty<T> {
    fn rx(&self) -> &RxObject {
        &self.inner.rx
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveProperty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveProperty")
            .field("value", &*lock(&self.inner.value))
            .field("errors", &lock(&self.inner.validation).aggregate())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}
