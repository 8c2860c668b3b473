#![forbid(unsafe_code)]

//! rxm public facade.
//!
//! Re-exports the sequence primitives from `rxm-core` and, with the default
//! `runtime` feature, the reactive objects from `rxm-runtime`. Most code only
//! needs the prelude:
//!
//! ```ignore
//! use rxm::prelude::*;
//!
//! struct Person {
//!     rx: RxObject,
//!     name: String,
//! }
//!
//! impl Person {
//!     fn set_name(&mut self, name: String) -> Result<bool> {
//!         self.rx.raise_and_set_if_changed(&mut self.name, name, "name")
//!     }
//! }
//!
//! impl Reactive for Person {
//!     fn rx(&self) -> &RxObject {
//!         &self.rx
//!     }
//! }
//! ```

pub use rxm_core;
#[cfg(feature = "runtime")]
pub use rxm_runtime;

pub use rxm_core::{
    BehaviorSubject, BoxObservable, Error, Fault, Observable, ObservableExt, Observer, Result,
    Scheduler, ScopedPublisher, SharedObserver, SharedScheduler, Subject, Subscription,
    combine_latest,
};

#[cfg(feature = "runtime")]
pub use rxm_runtime::{
    AsValueExt, Binder, BinderBuilder, BindingScope, LazyValueBinder, PropertyEvent, Reactive,
    ReactiveProperty, Registration, RuntimeConfig, RxObject, ValueBinder,
};

/// Common imports for ViewModel code.
pub mod prelude {
    pub use rxm_core::{
        BehaviorSubject, BoxObservable, CurrentThreadScheduler, Error, ImmediateScheduler,
        Observable, ObservableExt, Observer, QueueScheduler, Result, Subject, Subscription,
    };

    #[cfg(feature = "runtime")]
    pub use rxm_runtime::{
        AsValueExt, Binder, BinderBuilder, LazyValueBinder, PropertyEvent, Reactive,
        ReactiveProperty, ReactivePropertyOptions, Registration, RxObject, ValueBinder,
    };
}
