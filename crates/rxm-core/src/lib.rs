#![forbid(unsafe_code)]

//! Push-sequence primitives for rxm.
//!
//! This crate provides:
//! - [`Observer`] / [`Observable`] with RAII [`Subscription`] handles
//! - [`Subject`] and [`BehaviorSubject`] multicast relays
//! - the operators in [`ObservableExt`] plus [`combine_latest`]
//! - [`Scheduler`] with immediate, trampolining and queued implementations
//! - [`ScopedPublisher`], a relay with a fallback sink
//! - the shared [`Error`] type

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod publisher;
pub mod scheduler;
pub mod subject;
pub mod subscription;
pub mod sync;

pub use error::{Error, Fault, Result};
pub use observable::{BoxObservable, Observable, ObservableExt};
pub use observer::{FnObserver, Observer, SharedObserver, observer_fn, try_observer_fn};
pub use ops::combine_latest;
pub use publisher::ScopedPublisher;
pub use scheduler::{
    Action, CurrentThreadScheduler, ImmediateScheduler, QueueScheduler, Scheduler, SharedScheduler,
};
pub use subject::{BehaviorSubject, Subject};
pub use subscription::Subscription;
