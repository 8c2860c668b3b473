#![forbid(unsafe_code)]

//! Sequence operators returned by [`ObservableExt`](crate::ObservableExt).
//!
//! Every operator keeps its per-subscriber state (skip counters, the last
//! delivered item, the latest pair) inside the observer it installs, so two
//! subscriptions to the same operator never share state.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::observable::Observable;
use crate::observer::{Observer, SharedObserver};
use crate::scheduler::SharedScheduler;
use crate::subscription::Subscription;
use crate::sync::lock;

// ---------------------------------------------------------------------------
// map
// ---------------------------------------------------------------------------

/// See [`ObservableExt::map`](crate::ObservableExt::map).
pub struct Map<S, F, T> {
    source: S,
    f: Arc<F>,
    _item: PhantomData<fn(&T)>,
}

impl<S, F, T> Map<S, F, T> {
    pub(crate) fn new(source: S, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
            _item: PhantomData,
        }
    }
}

struct MapObserver<F, U> {
    f: Arc<F>,
    downstream: SharedObserver<U>,
}

impl<T, U, F> Observer<T> for MapObserver<F, U>
where
    F: Fn(&T) -> U + Send + Sync,
{
    fn on_next(&self, value: &T) -> Result<()> {
        self.downstream.on_next(&(self.f)(value))
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed()
    }
}

impl<S, F, T, U> Observable<U> for Map<S, F, T>
where
    S: Observable<T>,
    F: Fn(&T) -> U + Send + Sync + 'static,
    T: 'static,
    U: 'static,
{
    fn subscribe(&self, observer: SharedObserver<U>) -> Subscription {
        self.source.subscribe(Arc::new(MapObserver {
            f: Arc::clone(&self.f),
            downstream: observer,
        }))
    }
}

// ---------------------------------------------------------------------------
// filter
// ---------------------------------------------------------------------------

/// See [`ObservableExt::filter`](crate::ObservableExt::filter).
pub struct Filter<S, P> {
    source: S,
    predicate: Arc<P>,
}

impl<S, P> Filter<S, P> {
    pub(crate) fn new(source: S, predicate: P) -> Self {
        Self {
            source,
            predicate: Arc::new(predicate),
        }
    }
}

struct FilterObserver<P, T> {
    predicate: Arc<P>,
    downstream: SharedObserver<T>,
}

impl<T, P> Observer<T> for FilterObserver<P, T>
where
    P: Fn(&T) -> bool + Send + Sync,
{
    fn on_next(&self, value: &T) -> Result<()> {
        if (self.predicate)(value) {
            self.downstream.on_next(value)
        } else {
            Ok(())
        }
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed()
    }
}

impl<S, P, T> Observable<T> for Filter<S, P>
where
    S: Observable<T>,
    P: Fn(&T) -> bool + Send + Sync + 'static,
    T: 'static,
{
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        self.source.subscribe(Arc::new(FilterObserver {
            predicate: Arc::clone(&self.predicate),
            downstream: observer,
        }))
    }
}

// ---------------------------------------------------------------------------
// skip
// ---------------------------------------------------------------------------

/// See [`ObservableExt::skip`](crate::ObservableExt::skip).
pub struct Skip<S> {
    source: S,
    count: usize,
}

impl<S> Skip<S> {
    pub(crate) fn new(source: S, count: usize) -> Self {
        Self { source, count }
    }
}

struct SkipObserver<T> {
    remaining: AtomicUsize,
    downstream: SharedObserver<T>,
}

impl<T> Observer<T> for SkipObserver<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        let skipped = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if skipped {
            Ok(())
        } else {
            self.downstream.on_next(value)
        }
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed()
    }
}

impl<S, T> Observable<T> for Skip<S>
where
    S: Observable<T>,
    T: 'static,
{
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        self.source.subscribe(Arc::new(SkipObserver {
            remaining: AtomicUsize::new(self.count),
            downstream: observer,
        }))
    }
}

// ---------------------------------------------------------------------------
// distinct_until_changed
// ---------------------------------------------------------------------------

/// See [`ObservableExt::distinct_until_changed`](crate::ObservableExt::distinct_until_changed).
pub struct DistinctUntilChanged<S> {
    source: S,
}

impl<S> DistinctUntilChanged<S> {
    pub(crate) fn new(source: S) -> Self {
        Self { source }
    }
}

struct DistinctObserver<T> {
    last: Mutex<Option<T>>,
    downstream: SharedObserver<T>,
}

impl<T: PartialEq + Clone + Send> Observer<T> for DistinctObserver<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        {
            let mut last = lock(&self.last);
            if last.as_ref() == Some(value) {
                return Ok(());
            }
            *last = Some(value.clone());
        }
        self.downstream.on_next(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.downstream.on_completed()
    }
}

impl<S, T> Observable<T> for DistinctUntilChanged<S>
where
    S: Observable<T>,
    T: PartialEq + Clone + Send + 'static,
{
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        self.source.subscribe(Arc::new(DistinctObserver {
            last: Mutex::new(None),
            downstream: observer,
        }))
    }
}

// ---------------------------------------------------------------------------
// start_with
// ---------------------------------------------------------------------------

/// See [`ObservableExt::start_with`](crate::ObservableExt::start_with).
pub struct StartWith<S, T> {
    source: S,
    value: T,
}

impl<S, T> StartWith<S, T> {
    pub(crate) fn new(source: S, value: T) -> Self {
        Self { source, value }
    }
}

impl<S, T> Observable<T> for StartWith<S, T>
where
    S: Observable<T>,
    T: Send + Sync + 'static,
{
    /// The prefix is delivered before the source is attached. A failing
    /// prefix delivery is logged; the source is attached regardless.
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        if let Err(error) = observer.on_next(&self.value) {
            tracing::warn!(message = "sequence.start_with.failed", error = %error);
        }
        self.source.subscribe(observer)
    }
}

// ---------------------------------------------------------------------------
// observe_on
// ---------------------------------------------------------------------------

/// See [`ObservableExt::observe_on`](crate::ObservableExt::observe_on).
pub struct ObserveOn<S> {
    source: S,
    scheduler: SharedScheduler,
}

impl<S> ObserveOn<S> {
    pub(crate) fn new(source: S, scheduler: SharedScheduler) -> Self {
        Self { source, scheduler }
    }
}

/// Forwards every notification to `downstream` as a scheduled action.
pub(crate) struct ScheduledObserver<T> {
    scheduler: SharedScheduler,
    downstream: SharedObserver<T>,
}

impl<T> ScheduledObserver<T> {
    pub(crate) fn new(scheduler: SharedScheduler, downstream: SharedObserver<T>) -> Self {
        Self {
            scheduler,
            downstream,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observer<T> for ScheduledObserver<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        let downstream = Arc::clone(&self.downstream);
        let value = value.clone();
        self.scheduler
            .schedule(Box::new(move || downstream.on_next(&value)))
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        let downstream = Arc::clone(&self.downstream);
        let error = error.clone();
        self.scheduler
            .schedule(Box::new(move || downstream.on_error(&error)))
    }

    fn on_completed(&self) -> Result<()> {
        let downstream = Arc::clone(&self.downstream);
        self.scheduler
            .schedule(Box::new(move || downstream.on_completed()))
    }
}

impl<S, T> Observable<T> for ObserveOn<S>
where
    S: Observable<T>,
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        self.source.subscribe(Arc::new(ScheduledObserver::new(
            Arc::clone(&self.scheduler),
            observer,
        )))
    }
}

// ---------------------------------------------------------------------------
// combine_latest
// ---------------------------------------------------------------------------

/// Combine the latest items of two sequences once both have produced one.
pub fn combine_latest<SA, SB, A, B, U, F>(left: SA, right: SB, f: F) -> CombineLatest<SA, SB, F, A, B>
where
    SA: Observable<A>,
    SB: Observable<B>,
    F: Fn(&A, &B) -> U + Send + Sync + 'static,
{
    CombineLatest {
        left,
        right,
        f: Arc::new(f),
        _items: PhantomData,
    }
}

/// See [`combine_latest`].
pub struct CombineLatest<SA, SB, F, A, B> {
    left: SA,
    right: SB,
    f: Arc<F>,
    _items: PhantomData<fn(&A, &B)>,
}

struct Latest<A, B> {
    left: Option<A>,
    right: Option<B>,
    completed: u8,
}

struct CombineShared<A, B, F, U> {
    latest: Mutex<Latest<A, B>>,
    f: Arc<F>,
    downstream: SharedObserver<U>,
}

impl<A, B, F, U> CombineShared<A, B, F, U>
where
    A: Clone,
    B: Clone,
    F: Fn(&A, &B) -> U,
{
    fn update(&self, apply: impl FnOnce(&mut Latest<A, B>)) -> Result<()> {
        let pair = {
            let mut latest = lock(&self.latest);
            apply(&mut latest);
            match (&latest.left, &latest.right) {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            }
        };
        match pair {
            Some((a, b)) => self.downstream.on_next(&(self.f)(&a, &b)),
            None => Ok(()),
        }
    }

    fn complete_one(&self) -> Result<()> {
        let done = {
            let mut latest = lock(&self.latest);
            latest.completed += 1;
            latest.completed == 2
        };
        if done {
            self.downstream.on_completed()
        } else {
            Ok(())
        }
    }
}

struct LeftObserver<A, B, F, U>(Arc<CombineShared<A, B, F, U>>);
struct RightObserver<A, B, F, U>(Arc<CombineShared<A, B, F, U>>);

impl<A, B, F, U> Observer<A> for LeftObserver<A, B, F, U>
where
    A: Clone + Send,
    B: Clone + Send,
    F: Fn(&A, &B) -> U + Send + Sync,
{
    fn on_next(&self, value: &A) -> Result<()> {
        self.0.update(|latest| latest.left = Some(value.clone()))
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.0.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.0.complete_one()
    }
}

impl<A, B, F, U> Observer<B> for RightObserver<A, B, F, U>
where
    A: Clone + Send,
    B: Clone + Send,
    F: Fn(&A, &B) -> U + Send + Sync,
{
    fn on_next(&self, value: &B) -> Result<()> {
        self.0.update(|latest| latest.right = Some(value.clone()))
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.0.downstream.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.0.complete_one()
    }
}

impl<SA, SB, F, A, B, U> Observable<U> for CombineLatest<SA, SB, F, A, B>
where
    SA: Observable<A>,
    SB: Observable<B>,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    F: Fn(&A, &B) -> U + Send + Sync + 'static,
    U: 'static,
{
    fn subscribe(&self, observer: SharedObserver<U>) -> Subscription {
        let shared = Arc::new(CombineShared {
            latest: Mutex::new(Latest {
                left: None,
                right: None,
                completed: 0,
            }),
            f: Arc::clone(&self.f),
            downstream: observer,
        });
        let left = self.left.subscribe(Arc::new(LeftObserver(Arc::clone(&shared))));
        let right = self.right.subscribe(Arc::new(RightObserver(shared)));
        Subscription::merge([left, right])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ObservableExt;
    use crate::scheduler::QueueScheduler;
    use crate::subject::Subject;

    fn collect<T: Clone + Send + 'static>(
        source: &impl Observable<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = source.subscribe_next(move |v: &T| s.lock().unwrap().push(v.clone()));
        (seen, sub)
    }

    #[test]
    fn map_and_filter_compose() {
        let subject = Subject::<i32>::new();
        let evens = subject.clone().filter(|v| v % 2 == 0).map(|v| v * 10);
        let (seen, _sub) = collect(&evens);
        for v in 1..=4 {
            subject.on_next(&v).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![20, 40]);
    }

    #[test]
    fn skip_counts_per_subscription() {
        let subject = Subject::<i32>::new();
        let skipped = subject.clone().skip(1);
        let (first, _a) = collect(&skipped);
        subject.on_next(&1).unwrap();
        let (second, _b) = collect(&skipped);
        subject.on_next(&2).unwrap();
        subject.on_next(&3).unwrap();
        assert_eq!(*first.lock().unwrap(), vec![2, 3]);
        assert_eq!(*second.lock().unwrap(), vec![3]);
    }

    #[test]
    fn distinct_drops_consecutive_duplicates_only() {
        let subject = Subject::<i32>::new();
        let distinct = subject.clone().distinct_until_changed();
        let (seen, _sub) = collect(&distinct);
        for v in [1, 1, 2, 2, 1, 3, 3] {
            subject.on_next(&v).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1, 3]);
    }

    #[test]
    fn start_with_precedes_source() {
        let subject = Subject::<i32>::new();
        let prefixed = subject.clone().start_with(0);
        let (seen, _sub) = collect(&prefixed);
        subject.on_next(&7).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 7]);
    }

    #[test]
    fn observe_on_defers_to_scheduler() {
        let queue = Arc::new(QueueScheduler::new());
        let subject = Subject::<i32>::new();
        let scheduled = subject.clone().observe_on(queue.clone());
        let (seen, _sub) = collect(&scheduled);
        subject.on_next(&1).unwrap();
        subject.on_next(&2).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.run_pending(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn combine_latest_waits_for_both_sides() {
        let width = Subject::<u32>::new();
        let height = Subject::<u32>::new();
        let area = combine_latest(width.clone(), height.clone(), |w: &u32, h: &u32| w * h);
        let (seen, _sub) = collect(&area);
        width.on_next(&2).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        height.on_next(&3).unwrap();
        width.on_next(&4).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![6, 12]);
    }

    #[test]
    fn downstream_failure_reaches_publisher_through_operators() {
        let subject = Subject::<i32>::new();
        let mapped = subject.clone().map(|v| v + 1);
        let _sub = mapped.try_subscribe_next(|v| {
            if *v > 1 {
                Err(Error::msg("too big"))
            } else {
                Ok(())
            }
        });
        assert!(subject.on_next(&0).is_ok());
        assert!(subject.on_next(&1).is_err());
    }
}
