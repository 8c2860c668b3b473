#![forbid(unsafe_code)]

//! Per-object suppression and delay bookkeeping.
//!
//! [`NotificationState`] decides, for each raise request, whether the event
//! is delivered now, buffered until the outermost delay scope closes, or
//! dropped because notifications are suppressed. It never invokes observers
//! itself; the owning object does that with whatever [`admit`] returns and
//! with the batches handed back by [`end_delay`].
//!
//! # Invariants
//!
//! 1. Depth counters never go below zero; an unmatched exit is ignored.
//! 2. Suppression wins over delay: a suppressed event is neither delivered
//!    nor buffered, and is not replayed later.
//! 3. Buffers are drained only on the delay depth 1 → 0 transition.
//! 4. A drained batch holds one event per property name (the last one
//!    raised), ordered by where each name first appeared.
//!
//! [`admit`]: NotificationState::admit
//! [`end_delay`]: NotificationState::end_delay

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rxm_core::sync::lock;

use super::event::PropertyEvent;

/// Which of the two channels an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Raised before the value is assigned.
    Changing,
    /// Raised after the value is assigned.
    Changed,
}

/// Batches released when the outermost delay scope closes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Flush {
    /// Deduplicated changing events, delivered first.
    pub changing: Vec<PropertyEvent>,
    /// Deduplicated changed events, delivered after every changing event.
    pub changed: Vec<PropertyEvent>,
}

impl Flush {
    /// Whether neither batch holds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changing.is_empty() && self.changed.is_empty()
    }
}

/// Suppression/delay depths plus the pending buffers of one object.
#[derive(Debug, Default)]
pub struct NotificationState {
    suppress_depth: AtomicUsize,
    delay_depth: AtomicUsize,
    pending_changing: Mutex<Vec<PropertyEvent>>,
    pending_changed: Mutex<Vec<PropertyEvent>>,
}

impl NotificationState {
    /// Fresh state: active and immediate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether raises currently reach observers (no suppression scope open).
    #[must_use]
    pub fn are_enabled(&self) -> bool {
        self.suppress_depth.load(Ordering::Acquire) == 0
    }

    /// Whether a delay scope is open.
    #[must_use]
    pub fn are_delayed(&self) -> bool {
        self.delay_depth.load(Ordering::Acquire) > 0
    }

    pub(crate) fn begin_suppress(&self) {
        self.suppress_depth.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn end_suppress(&self) {
        let _ = decrement(&self.suppress_depth);
    }

    pub(crate) fn begin_delay(&self) {
        self.delay_depth.fetch_add(1, Ordering::AcqRel);
    }

    /// Close one delay scope. Returns the drained batches when this closed
    /// the outermost scope.
    pub(crate) fn end_delay(&self) -> Option<Flush> {
        match decrement(&self.delay_depth) {
            Some(1) => {
                let changing = std::mem::take(&mut *lock(&self.pending_changing));
                let changed = std::mem::take(&mut *lock(&self.pending_changed));
                Some(Flush {
                    changing: distinct_events(changing),
                    changed: distinct_events(changed),
                })
            }
            _ => None,
        }
    }

    /// Route one raise request. Returns the event when it must be delivered
    /// now; buffers or drops it otherwise.
    pub(crate) fn admit(&self, kind: ChangeKind, event: PropertyEvent) -> Option<PropertyEvent> {
        if !self.are_enabled() {
            tracing::trace!(
                message = "notifications.suppressed",
                kind = ?kind,
                property = event.property_name()
            );
            return None;
        }
        if self.are_delayed() {
            tracing::trace!(
                message = "notifications.buffered",
                kind = ?kind,
                property = event.property_name()
            );
            let buffer = match kind {
                ChangeKind::Changing => &self.pending_changing,
                ChangeKind::Changed => &self.pending_changed,
            };
            lock(buffer).push(event);
            return None;
        }
        Some(event)
    }

    /// Number of buffered `(changing, changed)` events.
    #[must_use]
    pub fn pending(&self) -> (usize, usize) {
        (
            lock(&self.pending_changing).len(),
            lock(&self.pending_changed).len(),
        )
    }
}

/// Returns the previous value, or `None` if the counter was already zero.
fn decrement(counter: &AtomicUsize) -> Option<usize> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .ok()
}

/// Collapse `events` to the last event per property name, ordered by the
/// first occurrence of each name. "All properties" events form their own key.
#[must_use]
pub fn distinct_events(events: Vec<PropertyEvent>) -> Vec<PropertyEvent> {
    let mut slots = HashMap::with_capacity(events.len());
    let mut out: Vec<PropertyEvent> = Vec::with_capacity(events.len());
    for event in events {
        let slot = slots.get(event.key()).copied();
        match slot {
            Some(index) => out[index] = event,
            None => {
                slots.insert(event.key().clone(), out.len());
                out.push(event);
            }
        }
    }
    out
}
