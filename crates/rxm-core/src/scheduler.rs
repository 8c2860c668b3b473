#![forbid(unsafe_code)]

//! Schedulers decide when a unit of delivery runs.
//!
//! | Scheduler                  | Runs an action                                    |
//! |----------------------------|---------------------------------------------------|
//! | [`ImmediateScheduler`]     | inline, on the calling thread                     |
//! | [`CurrentThreadScheduler`] | inline, unless a trampoline is already draining on this thread, in which case it is queued behind the running action |
//! | [`QueueScheduler`]         | when the owner calls [`QueueScheduler::run_pending`] |
//!
//! # Failure Modes
//!
//! An action that runs inside [`Scheduler::schedule`] reports its failure as
//! the return value. An action that runs later has no caller to report to;
//! its failure is logged at `warn` and dropped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::sync::lock;

/// A unit of scheduled work.
pub type Action = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Executes actions, now or later.
pub trait Scheduler: Send + Sync {
    /// Run or enqueue `action`. Returns the action's own result when it ran
    /// before this call returned, `Ok(())` otherwise.
    fn schedule(&self, action: Action) -> Result<()>;
}

/// Shared, type-erased scheduler.
pub type SharedScheduler = Arc<dyn Scheduler>;

fn log_deferred_failure(scheduler: &'static str, error: &Error) {
    tracing::warn!(
        message = "scheduler.action.failed",
        scheduler,
        error = %error
    );
}

// ---------------------------------------------------------------------------
// ImmediateScheduler
// ---------------------------------------------------------------------------

/// Runs every action inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// A shared handle.
    #[must_use]
    pub fn shared() -> SharedScheduler {
        Arc::new(Self)
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, action: Action) -> Result<()> {
        action()
    }
}

// ---------------------------------------------------------------------------
// CurrentThreadScheduler
// ---------------------------------------------------------------------------

thread_local! {
    static TRAMPOLINE: RefCell<Option<VecDeque<Action>>> = const { RefCell::new(None) };
}

/// Clears the trampoline even if an action unwinds.
struct TrampolineReset;

impl Drop for TrampolineReset {
    fn drop(&mut self) {
        TRAMPOLINE.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Trampolining scheduler: nested actions queue behind the one running on
/// this thread instead of recursing.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentThreadScheduler;

impl CurrentThreadScheduler {
    /// A shared handle.
    #[must_use]
    pub fn shared() -> SharedScheduler {
        Arc::new(Self)
    }

    /// Whether a trampoline is draining on the calling thread.
    #[must_use]
    pub fn is_draining() -> bool {
        TRAMPOLINE.with(|slot| slot.borrow().is_some())
    }
}

impl Scheduler for CurrentThreadScheduler {
    fn schedule(&self, action: Action) -> Result<()> {
        let action = TRAMPOLINE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(queue) = slot.as_mut() {
                queue.push_back(action);
                return None;
            }
            *slot = Some(VecDeque::new());
            Some(action)
        });
        let Some(action) = action else {
            return Ok(());
        };

        let _reset = TrampolineReset;
        let result = action();
        loop {
            let next = TRAMPOLINE.with(|slot| slot.borrow_mut().as_mut().and_then(VecDeque::pop_front));
            let Some(next) = next else { break };
            if let Err(error) = next() {
                log_deferred_failure("current_thread", &error);
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// QueueScheduler
// ---------------------------------------------------------------------------

/// FIFO queue drained explicitly by its owner, typically a UI loop or a test.
#[derive(Default)]
pub struct QueueScheduler {
    queue: Mutex<VecDeque<Action>>,
}

impl QueueScheduler {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run the oldest waiting action. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        let next = lock(&self.queue).pop_front();
        match next {
            Some(action) => {
                if let Err(error) = action() {
                    log_deferred_failure("queue", &error);
                }
                true
            }
            None => false,
        }
    }

    /// Run actions until the queue is empty, including any scheduled while
    /// draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, action: Action) -> Result<()> {
        lock(&self.queue).push_back(action);
        Ok(())
    }
}

impl std::fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn immediate_returns_action_result() {
        let s = ImmediateScheduler;
        assert!(s.schedule(Box::new(|| Ok(()))).is_ok());
        assert!(s.schedule(Box::new(|| Err(Error::msg("x")))).is_err());
    }

    #[test]
    fn current_thread_queues_nested_actions() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let outer = Arc::clone(&order);
        CurrentThreadScheduler
            .schedule(Box::new(move || -> Result<()> {
                outer.lock().unwrap().push("outer-start");
                let inner = Arc::clone(&outer);
                CurrentThreadScheduler.schedule(Box::new(move || {
                    inner.lock().unwrap().push("inner");
                    Ok(())
                }))?;
                outer.lock().unwrap().push("outer-end");
                Ok(())
            }))
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["outer-start", "outer-end", "inner"]);
        assert!(!CurrentThreadScheduler::is_draining());
    }

    #[test]
    fn current_thread_reports_outer_failure_only() {
        let result = CurrentThreadScheduler.schedule(Box::new(|| -> Result<()> {
            CurrentThreadScheduler.schedule(Box::new(|| Err(Error::msg("inner"))))?;
            Ok(())
        }));
        assert!(result.is_ok());
        let result = CurrentThreadScheduler.schedule(Box::new(|| Err(Error::msg("outer"))));
        assert_eq!(result.unwrap_err().to_string(), "outer");
    }

    #[test]
    fn queue_defers_until_drained() {
        let q = QueueScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let h = Arc::clone(&hits);
            q.schedule(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        }
        assert_eq!(q.pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(q.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(!q.run_one());
    }

    #[test]
    fn queue_keeps_fifo_order() {
        let q = QueueScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let o = Arc::clone(&order);
            q.schedule(Box::new(move || {
                o.lock().unwrap().push(i);
                Ok(())
            }))
            .unwrap();
        }
        q.run_pending();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
