#![forbid(unsafe_code)]

//! Reactive ViewModel runtime for rxm.
//!
//! # Key Components
//!
//! - [`RxObject`] - change notification with suppress/delay and exception
//!   funneling
//! - [`ValueBinder`] / [`LazyValueBinder`] - sequence-backed read-only values
//! - [`ReactiveProperty`] - observable value with validation
//! - [`Registration`] - the exception handler and schedulers shared by a
//!   group of objects
//! - [`RuntimeConfig`] - environment (and optionally TOML) configuration
//!
//! # Feature Flags
//!
//! - `config-file`: [`RuntimeConfig::from_toml_str`] and
//!   [`RuntimeConfig::load`].

pub mod config;
pub mod exceptions;
pub mod reactive;
pub mod registration;

pub use config::{ConfigError, ExceptionPolicy, RuntimeConfig, SchedulerKind};
pub use exceptions::DefaultExceptionHandler;
pub use reactive::{
    AsValueExt, Binder, BinderBuilder, BindingScope, ChangeKind, DelayGuard, Flush,
    LazyValueBinder, NotificationState, ObjectId, PropertyEvent, Reactive, ReactiveProperty,
    ReactivePropertyOptions, RxDisposableObject, RxObject, SuppressGuard, ValueBinder,
    WeakRxObject, distinct_events,
};
pub use registration::Registration;
