#![forbid(unsafe_code)]

//! The receiving side of a push sequence.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Receives the items, terminal error and completion of a sequence.
///
/// Every method reports failure through its return value. A sequence that
/// gets `Err` from `on_next` stops delivering the current item and hands the
/// error back to its own caller.
pub trait Observer<T: ?Sized>: Send + Sync {
    /// Deliver one item.
    fn on_next(&self, value: &T) -> Result<()>;

    /// The sequence terminated with `error`.
    fn on_error(&self, error: &Error) -> Result<()> {
        let _ = error;
        Ok(())
    }

    /// The sequence completed.
    fn on_completed(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: ?Sized, O: Observer<T> + ?Sized> Observer<T> for Arc<O> {
    fn on_next(&self, value: &T) -> Result<()> {
        (**self).on_next(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        (**self).on_error(error)
    }

    fn on_completed(&self) -> Result<()> {
        (**self).on_completed()
    }
}

/// Shared, type-erased observer.
pub type SharedObserver<T> = Arc<dyn Observer<T>>;

/// Observer assembled from closures.
pub struct FnObserver<N, E = fn(&Error) -> Result<()>, C = fn() -> Result<()>> {
    next: N,
    error: Option<E>,
    completed: Option<C>,
}

impl<N> FnObserver<N> {
    /// Observer that only handles items.
    pub fn new(next: N) -> Self {
        Self {
            next,
            error: None,
            completed: None,
        }
    }
}

impl<N, E, C> FnObserver<N, E, C> {
    /// Attach an error handler.
    pub fn with_error<E2>(self, error: E2) -> FnObserver<N, E2, C> {
        FnObserver {
            next: self.next,
            error: Some(error),
            completed: self.completed,
        }
    }

    /// Attach a completion handler.
    pub fn with_completed<C2>(self, completed: C2) -> FnObserver<N, E, C2> {
        FnObserver {
            next: self.next,
            error: self.error,
            completed: Some(completed),
        }
    }
}

impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    T: ?Sized,
    N: Fn(&T) -> Result<()> + Send + Sync,
    E: Fn(&Error) -> Result<()> + Send + Sync,
    C: Fn() -> Result<()> + Send + Sync,
{
    fn on_next(&self, value: &T) -> Result<()> {
        (self.next)(value)
    }

    fn on_error(&self, error: &Error) -> Result<()> {
        match &self.error {
            Some(handler) => handler(error),
            None => Ok(()),
        }
    }

    fn on_completed(&self) -> Result<()> {
        match &self.completed {
            Some(handler) => handler(),
            None => Ok(()),
        }
    }
}

impl<N, E, C> std::fmt::Debug for FnObserver<N, E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObserver")
            .field("handles_error", &self.error.is_some())
            .field("handles_completed", &self.completed.is_some())
            .finish()
    }
}

/// Wrap an infallible item callback.
pub fn observer_fn<T, F>(f: F) -> SharedObserver<T>
where
    T: ?Sized + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(FnObserver::new(move |value: &T| {
        f(value);
        Ok(())
    }))
}

/// Wrap a fallible item callback.
pub fn try_observer_fn<T, F>(f: F) -> SharedObserver<T>
where
    T: ?Sized + 'static,
    F: Fn(&T) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnObserver::new(f))
}
