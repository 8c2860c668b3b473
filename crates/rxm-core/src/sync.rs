//! Lock helpers.
//!
//! Guarded state in this workspace is always left consistent between
//! statements, so a poisoned lock is recovered instead of propagated.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the guard if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
