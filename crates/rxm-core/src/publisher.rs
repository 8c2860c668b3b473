#![forbid(unsafe_code)]

//! A multicast relay whose fallback sink only hears events while nobody
//! else is listening.
//!
//! [`ScopedPublisher`] is the channel behind exception funneling and value
//! binders. Publishing goes to one internal [`Subject`]; attached to it is
//! either the *default sink* (when no live subscriber exists) or the live
//! subscribers themselves.
//!
//! # Invariants
//!
//! 1. The default sink is attached iff the live-subscriber count is zero and
//!    the publisher has not been disposed.
//! 2. Detaching the default sink and incrementing the count happen under one
//!    lock, as do decrementing and re-attaching.
//! 3. A live observer is attached to the relay before the default sink is
//!    detached, and the default sink is re-attached before the last live
//!    observer leaves. Every publish reaches at least one consumer.
//! 4. Every delivery, to live subscribers and to the default sink alike, goes
//!    through the publisher's scheduler.
//!
//! # Failure Modes
//!
//! - A consumer failure during a delivery that ran inside `publish` is
//!   returned from `publish`.
//! - A failure in a deferred delivery is logged by the scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::observable::Observable;
use crate::observer::{Observer, SharedObserver};
use crate::ops::ScheduledObserver;
use crate::scheduler::SharedScheduler;
use crate::subject::Subject;
use crate::subscription::Subscription;
use crate::sync::lock;

struct Routing {
    live: usize,
    default_subscription: Option<Subscription>,
}

struct PublisherInner<T> {
    relay: Subject<T>,
    scheduler: SharedScheduler,
    default_sink: Option<SharedObserver<T>>,
    routing: Mutex<Routing>,
    disposed: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> PublisherInner<T> {
    fn route(&self, observer: SharedObserver<T>) -> SharedObserver<T> {
        Arc::new(ScheduledObserver::new(Arc::clone(&self.scheduler), observer))
    }

    fn attach_default(&self, routing: &mut Routing) {
        if self.disposed.load(Ordering::Acquire) || routing.default_subscription.is_some() {
            return;
        }
        if let Some(sink) = &self.default_sink {
            routing.default_subscription = Some(self.relay.subscribe(self.route(Arc::clone(sink))));
        }
    }

    fn release_live(&self) {
        let mut routing = lock(&self.routing);
        routing.live = routing.live.saturating_sub(1);
        if routing.live == 0 {
            self.attach_default(&mut routing);
            tracing::trace!(message = "publisher.default_sink.reattached");
        }
    }
}

/// Multicast relay with a default sink active only while no live subscriber
/// is attached. Cloning yields another handle to the same relay.
pub struct ScopedPublisher<T> {
    inner: Arc<PublisherInner<T>>,
}

impl<T> Clone for ScopedPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ScopedPublisher<T> {
    /// A publisher with no default sink.
    #[must_use]
    pub fn new(scheduler: SharedScheduler) -> Self {
        Self::build(scheduler, None)
    }

    /// A publisher whose `sink` receives events while nobody is subscribed.
    #[must_use]
    pub fn with_default_sink(scheduler: SharedScheduler, sink: SharedObserver<T>) -> Self {
        Self::build(scheduler, Some(sink))
    }

    fn build(scheduler: SharedScheduler, default_sink: Option<SharedObserver<T>>) -> Self {
        let inner = Arc::new(PublisherInner {
            relay: Subject::new(),
            scheduler,
            default_sink,
            routing: Mutex::new(Routing {
                live: 0,
                default_subscription: None,
            }),
            disposed: AtomicBool::new(false),
        });
        inner.attach_default(&mut lock(&inner.routing));
        Self { inner }
    }

    /// Deliver `value` to every attached consumer.
    pub fn publish(&self, value: &T) -> Result<()> {
        self.inner.relay.on_next(value)
    }

    /// Deliver a terminal error.
    pub fn publish_error(&self, error: &Error) -> Result<()> {
        self.inner.relay.on_error(error)
    }

    /// Deliver completion.
    pub fn publish_completed(&self) -> Result<()> {
        self.inner.relay.on_completed()
    }

    /// Number of live (non-default) subscribers.
    #[must_use]
    pub fn live_subscribers(&self) -> usize {
        lock(&self.inner.routing).live
    }

    /// Whether the default sink currently receives events.
    #[must_use]
    pub fn is_default_sink_active(&self) -> bool {
        lock(&self.inner.routing).default_subscription.is_some()
    }

    /// Drop every consumer, including the default sink. Later publishes are
    /// ignored.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        let default_subscription = lock(&self.inner.routing).default_subscription.take();
        drop(default_subscription);
        self.inner.relay.dispose();
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<T: Clone + Send + Sync + 'static> Observer<T> for ScopedPublisher<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        self.publish(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.publish_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.publish_completed()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> for ScopedPublisher<T> {
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        let live = self.inner.relay.subscribe(self.inner.route(observer));
        let detached = {
            let mut routing = lock(&self.inner.routing);
            routing.live += 1;
            routing.default_subscription.take()
        };
        if detached.is_some() {
            tracing::trace!(message = "publisher.default_sink.detached");
        }
        drop(detached);

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.release_live();
            }
            drop(live);
        })
    }
}

impl<T> std::fmt::Debug for ScopedPublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routing = lock(&self.inner.routing);
        f.debug_struct("ScopedPublisher")
            .field("live", &routing.live)
            .field("default_active", &routing.default_subscription.is_some())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}
