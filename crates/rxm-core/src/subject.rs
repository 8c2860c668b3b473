#![forbid(unsafe_code)]

//! Multicast subjects: both an [`Observer`] and an [`Observable`].
//!
//! # Invariants
//!
//! 1. Observers are notified in subscription order.
//! 2. The observer list is snapshotted before delivery; no lock is held while
//!    an observer runs, so observers may subscribe or unsubscribe re-entrantly.
//! 3. After `on_error`, `on_completed` or `dispose` the subject is stopped:
//!    further items are ignored and new subscribers receive only the
//!    terminal notification.
//!
//! # Failure Modes
//!
//! - An observer returning `Err` from `on_next` stops delivery of that item;
//!   later observers do not see it and the error is returned to the caller.
//! - Terminal notifications reach every observer; the first failure is
//!   returned after all have been notified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{Error, Result};
use crate::observable::Observable;
use crate::observer::{Observer, SharedObserver};
use crate::subscription::Subscription;
use crate::sync::lock;

#[derive(Clone)]
enum Terminal {
    Completed,
    Errored(Error),
    Disposed,
}

struct SubjectState<T> {
    observers: Vec<(u64, SharedObserver<T>)>,
    terminal: Option<Terminal>,
}

struct SubjectInner<T> {
    state: Mutex<SubjectState<T>>,
    next_id: AtomicU64,
}

impl<T> SubjectInner<T> {
    fn remove(&self, id: u64) {
        lock(&self.state).observers.retain(|(oid, _)| *oid != id);
    }
}

/// Plain multicast subject.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Create a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                state: Mutex::new(SubjectState {
                    observers: Vec::new(),
                    terminal: None,
                }),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.state).observers.len()
    }

    /// Whether any observer is attached.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Whether a terminal notification or `dispose` has been seen.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        lock(&self.inner.state).terminal.is_some()
    }

    /// Detach every observer without notifying them and stop the subject.
    pub fn dispose(&self) {
        let dropped = {
            let mut state = lock(&self.inner.state);
            if state.terminal.is_none() {
                state.terminal = Some(Terminal::Disposed);
            }
            std::mem::take(&mut state.observers)
        };
        drop(dropped);
    }

    fn snapshot(&self) -> Option<Vec<SharedObserver<T>>> {
        let state = lock(&self.inner.state);
        if state.terminal.is_some() {
            return None;
        }
        Some(state.observers.iter().map(|(_, o)| Arc::clone(o)).collect())
    }

    fn terminate(&self, terminal: Terminal) -> Option<Vec<SharedObserver<T>>> {
        let mut state = lock(&self.inner.state);
        if state.terminal.is_some() {
            return None;
        }
        state.terminal = Some(terminal);
        Some(
            std::mem::take(&mut state.observers)
                .into_iter()
                .map(|(_, o)| o)
                .collect(),
        )
    }
}

fn deliver_all<T: ?Sized>(
    observers: Vec<SharedObserver<T>>,
    notify: impl Fn(&dyn Observer<T>) -> Result<()>,
) -> Result<()> {
    let mut first = None;
    for observer in observers {
        if let Err(error) = notify(observer.as_ref()) {
            first.get_or_insert(error);
        }
    }
    first.map_or(Ok(()), Err)
}

impl<T: 'static> Observer<T> for Subject<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        let Some(observers) = self.snapshot() else {
            return Ok(());
        };
        for observer in observers {
            observer.on_next(value)?;
        }
        Ok(())
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        match self.terminate(Terminal::Errored(error.clone())) {
            Some(observers) => deliver_all(observers, |o| o.on_error(error)),
            None => Ok(()),
        }
    }

    fn on_completed(&self) -> Result<()> {
        match self.terminate(Terminal::Completed) {
            Some(observers) => deliver_all(observers, |o| o.on_completed()),
            None => Ok(()),
        }
    }
}

impl<T: 'static> Observable<T> for Subject<T> {
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        let terminal = {
            let mut state = lock(&self.inner.state);
            if state.terminal.is_none() {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                state.observers.push((id, observer));
                let weak: Weak<SubjectInner<T>> = Arc::downgrade(&self.inner);
                return Subscription::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.remove(id);
                    }
                });
            }
            state.terminal.clone()
        };
        let replay = match terminal {
            Some(Terminal::Completed) => observer.on_completed(),
            Some(Terminal::Errored(error)) => observer.on_error(&error),
            Some(Terminal::Disposed) | None => Ok(()),
        };
        if let Err(error) = replay {
            tracing::warn!(message = "subject.terminal_replay.failed", error = %error);
        }
        Subscription::empty()
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Subject")
            .field("observers", &state.observers.len())
            .field("stopped", &state.terminal.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BehaviorSubject
// ---------------------------------------------------------------------------

/// Subject that holds a current value and replays it to each new subscriber.
pub struct BehaviorSubject<T> {
    current: Arc<Mutex<T>>,
    subject: Subject<T>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            subject: self.subject.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> BehaviorSubject<T> {
    /// Create a subject seeded with `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
            subject: Subject::new(),
        }
    }

    /// The latest value.
    #[must_use]
    pub fn value(&self) -> T {
        lock(&self.current).clone()
    }

    /// Number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }

    /// Detach every observer and stop.
    pub fn dispose(&self) {
        self.subject.dispose();
    }
}

impl<T: Clone + Send + 'static> Observer<T> for BehaviorSubject<T> {
    fn on_next(&self, value: &T) -> Result<()> {
        if self.subject.is_stopped() {
            return Ok(());
        }
        *lock(&self.current) = value.clone();
        self.subject.on_next(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        self.subject.on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        self.subject.on_completed()
    }
}

impl<T: Clone + Send + 'static> Observable<T> for BehaviorSubject<T> {
    fn subscribe(&self, observer: SharedObserver<T>) -> Subscription {
        if self.subject.is_stopped() {
            return self.subject.subscribe(observer);
        }
        let current = self.value();
        if let Err(error) = observer.on_next(&current) {
            tracing::warn!(message = "subject.behavior_replay.failed", error = %error);
        }
        self.subject.subscribe(observer)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BehaviorSubject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorSubject")
            .field("value", &*lock(&self.current))
            .field("subject", &self.subject)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ObservableExt;

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        (seen, move |v: &i32| s.lock().unwrap().push(*v))
    }

    #[test]
    fn multicasts_in_subscription_order() {
        let subject = Subject::<i32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let _s1 = subject.subscribe_next(move |v| a.lock().unwrap().push(("a", *v)));
        let _s2 = subject.subscribe_next(move |v| b.lock().unwrap().push(("b", *v)));
        subject.on_next(&1).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn unsubscribe_detaches() {
        let subject = Subject::<i32>::new();
        let (seen, f) = recorder();
        let sub = subject.subscribe_next(f);
        subject.on_next(&1).unwrap();
        drop(sub);
        subject.on_next(&2).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert!(!subject.has_observers());
    }

    #[test]
    fn failure_stops_delivery_of_the_item() {
        let subject = Subject::<i32>::new();
        let _fail = subject.try_subscribe_next(|_| Err(Error::msg("first")));
        let (seen, f) = recorder();
        let _late = subject.subscribe_next(f);
        let err = subject.on_next(&1).unwrap_err();
        assert_eq!(err.to_string(), "first");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn completion_is_terminal_and_replayed() {
        let subject = Subject::<i32>::new();
        subject.on_completed().unwrap();
        assert!(subject.is_stopped());
        let done = Arc::new(Mutex::new(false));
        let d = Arc::clone(&done);
        let observer = crate::observer::FnObserver::new(|_: &i32| Ok::<(), Error>(()))
            .with_completed(move || {
                *d.lock().unwrap() = true;
                Ok::<(), Error>(())
            });
        let sub = subject.subscribe(Arc::new(observer));
        assert!(sub.is_closed());
        assert!(*done.lock().unwrap());
        assert!(subject.on_next(&5).is_ok());
    }

    #[test]
    fn dispose_drops_observers_silently() {
        let subject = Subject::<i32>::new();
        let (seen, f) = recorder();
        let _sub = subject.subscribe_next(f);
        subject.dispose();
        subject.on_next(&1).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn behavior_replays_current_value() {
        let subject = BehaviorSubject::new(10);
        subject.on_next(&11).unwrap();
        let (seen, f) = recorder();
        let _sub = subject.subscribe_next(f);
        subject.on_next(&12).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![11, 12]);
        assert_eq!(subject.value(), 12);
    }

    #[test]
    fn reentrant_unsubscribe_during_delivery() {
        let subject = Subject::<i32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let sub = subject.subscribe_next(move |_| {
            s.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);
        subject.on_next(&1).unwrap();
        assert_eq!(subject.observer_count(), 0);
    }
}
