#![forbid(unsafe_code)]

//! The producing side of a push sequence and its combinators.
//!
//! An [`Observable`] hands every subscriber a [`Subscription`]; dropping it
//! detaches the subscriber. Operators in [`ObservableExt`] wrap a source and
//! produce a new observable without subscribing to anything until their own
//! `subscribe` is called.

use std::sync::Arc;

use crate::error::Result;
use crate::observer::{SharedObserver, observer_fn, try_observer_fn};
use crate::ops::{DistinctUntilChanged, Filter, Map, ObserveOn, Skip, StartWith};
use crate::scheduler::SharedScheduler;
use crate::subscription::Subscription;

/// A sequence that can be subscribed to.
pub trait Observable<T>: Send + Sync {
    /// Attach `observer`. Delivery stops once the returned handle is released.
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription;
}

/// Shared, type-erased observable.
pub type BoxObservable<T> = Arc<dyn Observable<T>>;

impl<T, O: Observable<T> + ?Sized> Observable<T> for Arc<O> {
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        (**self).subscribe(observer)
    }
}

/// Combinators available on every [`Observable`].
pub trait ObservableExt<T: 'static>: Observable<T> {
    /// Subscribe an infallible item callback.
    fn subscribe_next(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.subscribe(observer_fn(f))
    }

    /// Subscribe a fallible item callback.
    fn try_subscribe_next(
        &self,
        f: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(try_observer_fn(f))
    }

    /// Project every item through `f`.
    fn map<U, F>(self, f: F) -> Map<Self, F, T>
    where
        Self: Sized,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Map::new(self, f)
    }

    /// Forward only the items `predicate` accepts.
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        Self: Sized,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Filter::new(self, predicate)
    }

    /// Drop the first `count` items of each subscription.
    fn skip(self, count: usize) -> Skip<Self>
    where
        Self: Sized,
    {
        Skip::new(self, count)
    }

    /// Drop items equal to the one delivered just before them.
    fn distinct_until_changed(self) -> DistinctUntilChanged<Self>
    where
        Self: Sized,
        T: PartialEq + Clone + Send,
    {
        DistinctUntilChanged::new(self)
    }

    /// Deliver `value` to each subscriber before anything from the source.
    fn start_with(self, value: T) -> StartWith<Self, T>
    where
        Self: Sized,
        T: Send + Sync,
    {
        StartWith::new(self, value)
    }

    /// Deliver every notification through `scheduler`.
    fn observe_on(self, scheduler: SharedScheduler) -> ObserveOn<Self>
    where
        Self: Sized,
    {
        ObserveOn::new(self, scheduler)
    }

    /// Erase the concrete operator type.
    fn boxed(self) -> BoxObservable<T>
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

impl<T: 'static, O: Observable<T> + ?Sized> ObservableExt<T> for O {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use crate::observer::Observer;
    use std::sync::Mutex;

    #[test]
    fn boxed_observable_forwards_subscribe() {
        let subject = Subject::<i32>::new();
        let boxed: BoxObservable<i32> = subject.clone().boxed();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = boxed.subscribe_next(move |v| s.lock().unwrap().push(*v));
        subject.on_next(&4).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn try_subscribe_next_reports_failure_to_publisher() {
        let subject = Subject::<i32>::new();
        let _sub = subject.try_subscribe_next(|_| Err(crate::Error::msg("nope")));
        assert!(subject.on_next(&1).is_err());
    }
}
