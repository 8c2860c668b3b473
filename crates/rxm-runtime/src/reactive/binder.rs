#![forbid(unsafe_code)]

//! Value binders: the latest item of a sequence as a plain readable value.
//!
//! A binder subscribes `source.distinct_until_changed().start_with(initial)`
//! into an internal [`ScopedPublisher`] relay. The relay's single consumer
//! runs, for every item, `on_changing(v)`, stores `v`, then `on_changed(v)`.
//!
//! | Variant              | Subscribes                         | Initial value computed |
//! |----------------------|------------------------------------|------------------------|
//! | [`ValueBinder`]      | at construction                    | at construction        |
//! | [`LazyValueBinder`]  | on the first [`Binder::value`] call | on that first call    |
//!
//! Most binders back a property of a ViewModel and announce it on the
//! owner's dispatcher:
//!
//! ```ignore
//! let total = prices
//!     .clone()
//!     .map(|p| p.iter().sum::<u32>())
//!     .as_property(&vm.rx, "total", false);
//! assert_eq!(total.value(), 0);
//! ```
//!
//! An owner-bound binder delivers through the owner's
//! [`Registration::main_thread_scheduler`], and its events pass through the
//! owner's suppress and delay scopes like any other raise.
//!
//! # Invariants
//!
//! 1. Reading [`Binder::value`] never blocks; on an eager binder it never
//!    subscribes.
//! 2. A lazy binder wires itself at most once, even under concurrent first
//!    reads.
//! 3. After [`Binder::dispose`] no callback runs and the cached value stops
//!    changing.
//! 4. Callbacks hold only a weak reference to the binder state, so dropping
//!    the binder releases its subscriptions.
//! 5. The wiring read of a lazy binder stores the initial value before
//!    connecting; the supplier runs once whatever the scheduler.
//!
//! # Failure Modes
//!
//! - A callback failure during a delivery that ran inline is returned to
//!   whoever pushed the item into the source; with a deferring scheduler it
//!   is logged.
//! - An error terminating the source is handed back to the source's
//!   publisher rather than swallowed; the cached value keeps its last item.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwapOption;
use rxm_core::sync::lock;
use rxm_core::{
    BoxObservable, CurrentThreadScheduler, Error, Observable, ObservableExt, Observer, Result,
    ScopedPublisher, SharedScheduler, Subscription,
};

use super::object::RxObject;
use super::scope::BindingScope;
use crate::registration::Registration;

type Callback<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;
type Supplier<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Read access to a bound value.
pub trait Binder<T> {
    /// The latest value.
    fn value(&self) -> T;

    /// Release the upstream subscription. Idempotent.
    fn dispose(&self);

    /// Whether [`dispose`](Self::dispose) has run.
    fn is_disposed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct BinderCore<T> {
    current: Mutex<Option<T>>,
    scope: Mutex<BindingScope>,
    disposed: AtomicBool,
}

impl<T: Clone> BinderCore<T> {
    fn new(current: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(current),
            scope: Mutex::new(BindingScope::new()),
            disposed: AtomicBool::new(false),
        })
    }

    fn current(&self) -> Option<T> {
        lock(&self.current).clone()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns `false` when this call did not perform the disposal.
    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let released = std::mem::take(&mut *lock(&self.scope));
        drop(released);
        true
    }

    fn hold(&self, subscription: Subscription) {
        if self.is_disposed() {
            subscription.unsubscribe();
            return;
        }
        lock(&self.scope).hold(subscription);
    }
}

/// Everything needed to connect a binder to its source.
struct Wiring<T> {
    source: BoxObservable<T>,
    on_changing: Option<Callback<T>>,
    on_changed: Callback<T>,
    scheduler: SharedScheduler,
    initial: Supplier<T>,
}

/// The relay's consumer: changing, store, changed.
struct BinderSink<T> {
    core: Weak<BinderCore<T>>,
    on_changing: Option<Callback<T>>,
    on_changed: Callback<T>,
}

impl<T: Clone + Send + Sync> Observer<T> for BinderSink<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        let Some(core) = self.core.upgrade() else {
            return Ok(());
        };
        if core.is_disposed() {
            return Ok(());
        }
        if let Some(on_changing) = &self.on_changing {
            on_changing(value)?;
        }
        *lock(&core.current) = Some(value.clone());
        (self.on_changed)(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        tracing::debug!(message = "binder.source.failed", error = %error);
        Err(error.clone())
    }
}

impl<T> Wiring<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Connect `source` to `core`, seeding the relay with `initial`.
    fn connect(&self, core: &Arc<BinderCore<T>>, initial: T) -> Subscription {
        let relay = ScopedPublisher::new(Arc::clone(&self.scheduler));
        let sink = relay.subscribe(Arc::new(BinderSink {
            core: Arc::downgrade(core),
            on_changing: self.on_changing.clone(),
            on_changed: Arc::clone(&self.on_changed),
        }));
        let closing = relay.clone();
        let upstream = Arc::clone(&self.source)
            .distinct_until_changed()
            .start_with(initial)
            .subscribe(Arc::new(relay));
        Subscription::merge([Subscription::new(move || closing.dispose()), sink, upstream])
    }
}

// ---------------------------------------------------------------------------
// ValueBinder
// ---------------------------------------------------------------------------

/// Binder that subscribes at construction.
pub struct ValueBinder<T> {
    core: Arc<BinderCore<T>>,
    initial: Supplier<T>,
}

impl<T> ValueBinder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn connect(wiring: Wiring<T>) -> Self {
        let initial = (wiring.initial)();
        let core = BinderCore::new(Some(initial.clone()));
        tracing::debug!(message = "binder.wired", lazy = false);
        core.hold(wiring.connect(&core, initial));
        Self {
            core,
            initial: wiring.initial,
        }
    }
}

impl<T: Clone> Binder<T> for ValueBinder<T> {
    fn value(&self) -> T {
        self.core.current().unwrap_or_else(|| (self.initial)())
    }

    fn dispose(&self) {
        if self.core.dispose() {
            tracing::debug!(message = "binder.disposed", lazy = false);
        }
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<T: std::fmt::Debug + Clone> std::fmt::Debug for ValueBinder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBinder")
            .field("value", &self.core.current())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LazyValueBinder
// ---------------------------------------------------------------------------

/// Binder that subscribes on its first read.
pub struct LazyValueBinder<T> {
    core: Arc<BinderCore<T>>,
    pending: ArcSwapOption<Wiring<T>>,
    initial: Supplier<T>,
}

impl<T> LazyValueBinder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn deferred(wiring: Wiring<T>) -> Self {
        let initial = Arc::clone(&wiring.initial);
        Self {
            core: BinderCore::new(None),
            pending: ArcSwapOption::from_pointee(wiring),
            initial,
        }
    }

    /// Whether the first read has wired the binder.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pending.load().is_none() && !self.core.is_disposed()
    }
}

impl<T> Binder<T> for LazyValueBinder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn value(&self) -> T {
        if let Some(wiring) = self.pending.swap(None) {
            tracing::debug!(message = "binder.wired", lazy = true);
            let initial = (wiring.initial)();
            // Seed before connecting: a deferring scheduler delivers later.
            *lock(&self.core.current) = Some(initial.clone());
            let subscription = wiring.connect(&self.core, initial);
            self.core.hold(subscription);
        }
        self.core.current().unwrap_or_else(|| (self.initial)())
    }

    fn dispose(&self) {
        let discarded = self.pending.swap(None);
        if self.core.dispose() {
            tracing::debug!(
                message = "binder.disposed",
                lazy = true,
                was_connected = discarded.is_none()
            );
        }
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<T: std::fmt::Debug + Clone> std::fmt::Debug for LazyValueBinder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyValueBinder")
            .field("value", &self.core.current())
            .field("connected", &self.pending.load().is_none())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Configures a [`ValueBinder`] or [`LazyValueBinder`].
pub struct BinderBuilder<T> {
    source: BoxObservable<T>,
    on_changing: Option<Callback<T>>,
    on_changed: Callback<T>,
    scheduler: Option<SharedScheduler>,
    initial: Supplier<T>,
}

impl<T> BinderBuilder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Bind `source`, calling `on_changed` after every stored item. The
    /// initial value is `T::default()`.
    pub fn new(
        source: impl Observable<T> + 'static,
        on_changed: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self
    where
        T: Default,
    {
        Self::with_initial(source, on_changed, T::default)
    }

    /// Bind `source` with an explicit initial-value supplier.
    pub fn with_initial(
        source: impl Observable<T> + 'static,
        on_changed: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
        initial: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: source.boxed(),
            on_changing: None,
            on_changed: Arc::new(on_changed),
            scheduler: None,
            initial: Arc::new(initial),
        }
    }

    /// Bind `source` to property `name` of `owner`. Every stored item raises
    /// changed for `name`, and changing before the store when
    /// `raise_changing` is set. The owner is held weakly; delivery uses its
    /// main-thread scheduler.
    pub fn for_property(
        source: impl Observable<T> + 'static,
        owner: &RxObject,
        name: &str,
        raise_changing: bool,
    ) -> Self
    where
        T: Default,
    {
        let name: Arc<str> = Arc::from(name);
        let weak = owner.downgrade();
        let changed = Arc::clone(&name);
        let mut builder = Self::new(source, move |_: &T| {
            weak.upgrade()
                .map_or(Ok(()), |rx| rx.raise_property_changed(&changed))
        });
        if raise_changing {
            let weak = owner.downgrade();
            builder = builder.on_changing(move |_: &T| {
                weak.upgrade()
                    .map_or(Ok(()), |rx| rx.raise_property_changing(&name))
            });
        }
        builder.registration(owner.registration())
    }

    /// Call `f` before every item is stored.
    #[must_use]
    pub fn on_changing(mut self, f: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_changing = Some(Arc::new(f));
        self
    }

    /// Replace the changed callback.
    #[must_use]
    pub fn on_changed(mut self, f: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_changed = Arc::new(f);
        self
    }

    /// Deliver through `scheduler` instead of the current-thread trampoline.
    #[must_use]
    pub fn scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Deliver through the main-thread scheduler of `registration`.
    #[must_use]
    pub fn registration(self, registration: &Registration) -> Self {
        self.scheduler(Arc::clone(&registration.main_thread_scheduler))
    }

    /// Replace the initial-value supplier.
    #[must_use]
    pub fn initial_value(mut self, f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.initial = Arc::new(f);
        self
    }

    fn into_wiring(self) -> Wiring<T> {
        Wiring {
            source: self.source,
            on_changing: self.on_changing,
            on_changed: self.on_changed,
            scheduler: self.scheduler.unwrap_or_else(CurrentThreadScheduler::shared),
            initial: self.initial,
        }
    }

    /// Subscribe now.
    #[must_use]
    pub fn build(self) -> ValueBinder<T> {
        ValueBinder::connect(self.into_wiring())
    }

    /// Subscribe on first read.
    #[must_use]
    pub fn build_lazy(self) -> LazyValueBinder<T> {
        LazyValueBinder::deferred(self.into_wiring())
    }
}

impl<T> std::fmt::Debug for BinderBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderBuilder")
            .field("on_changing", &self.on_changing.is_some())
            .field("scheduler", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

/// Shorthands binding any sequence with a default initial value.
pub trait AsValueExt<T>: Observable<T> + Sized + 'static
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    /// Eager binder calling `on_changed` after every stored item.
    fn as_value(
        self,
        on_changed: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> ValueBinder<T> {
        BinderBuilder::new(self, on_changed).build()
    }

    /// Lazy binder calling `on_changed` after every stored item.
    fn as_lazy_value(
        self,
        on_changed: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> LazyValueBinder<T> {
        BinderBuilder::new(self, on_changed).build_lazy()
    }

    /// Eager binder announcing `name` on `owner`.
    fn as_property(self, owner: &RxObject, name: &str, raise_changing: bool) -> ValueBinder<T> {
        BinderBuilder::for_property(self, owner, name, raise_changing).build()
    }

    /// Lazy binder announcing `name` on `owner`.
    fn as_lazy_property(
        self,
        owner: &RxObject,
        name: &str,
        raise_changing: bool,
    ) -> LazyValueBinder<T> {
        BinderBuilder::for_property(self, owner, name, raise_changing).build_lazy()
    }
}

impl<T, O> AsValueExt<T> for O
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
    O: Observable<T> + 'static,
{
}
