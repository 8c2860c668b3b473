#![forbid(unsafe_code)]

//! Reactive ViewModel primitives.
//!
//! - [`RxObject`]: changing/changed channels with suppression, delay and an
//!   exception channel, composed into ViewModels.
//! - [`NotificationState`]: the suppress/delay counters and delay buffers.
//! - [`ValueBinder`] / [`LazyValueBinder`]: the latest item of a sequence as
//!   a readable value, with changing/changed callbacks.
//! - [`ReactiveProperty`]: a standalone observable value with validation.
//! - [`BindingScope`]: RAII ownership for a group of subscriptions.
//!
//! # Architecture
//!
//! Everything here is `Send + Sync` and built from `rxm-core` subjects.
//! Lazily needed state (notification buffers, the exception relay) is
//! allocated on first use so an idle object stays small. Callbacks that
//! reach back into their owner hold a `Weak` reference.
//!
//! # Invariants
//!
//! 1. Property events carry the raising object's [`ObjectId`] as sender.
//! 2. A flush delivers each property name at most once per channel.
//! 3. Dropping an owner releases every subscription it registered.

pub mod binder;
pub mod event;
pub mod notifications;
pub mod object;
pub mod property;
pub mod scope;

pub use binder::{AsValueExt, Binder, BinderBuilder, LazyValueBinder, ValueBinder};
pub use event::{ObjectId, PropertyEvent};
pub use notifications::{ChangeKind, Flush, NotificationState, distinct_events};
pub use object::{
    DelayGuard, Reactive, RxDisposableObject, RxObject, SuppressGuard, WeakRxObject,
};
pub use property::{ReactiveProperty, ReactivePropertyOptions};
pub use scope::BindingScope;
