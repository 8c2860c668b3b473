#![forbid(unsafe_code)]

//! The collaborators a reactive object needs, passed in explicitly.
//!
//! A [`Registration`] bundles the exception sink and the main-thread
//! scheduler. Objects take one at construction; nothing is looked up from
//! global state. Binders bound to an object through
//! [`BinderBuilder::for_property`](crate::BinderBuilder::for_property) deliver
//! through the object's main-thread scheduler. Work that belongs elsewhere is
//! moved explicitly with `observe_on`.

use std::sync::Arc;

use rxm_core::{
    CurrentThreadScheduler, Error, ImmediateScheduler, QueueScheduler, SharedObserver,
    SharedScheduler,
};

use crate::config::{RuntimeConfig, SchedulerKind};
use crate::exceptions::DefaultExceptionHandler;

/// Exception sink and scheduler shared by reactive objects.
#[derive(Clone)]
pub struct Registration {
    /// Receives failures when nobody observes an object's exceptions.
    pub exception_handler: SharedObserver<Error>,
    /// Scheduler for UI-affine delivery; owner-bound binders use it.
    pub main_thread_scheduler: SharedScheduler,
    main_queue: Option<Arc<QueueScheduler>>,
}

impl Registration {
    /// Build the bundle described by `config`.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let (main_thread_scheduler, main_queue): (SharedScheduler, _) = match config.scheduler {
            SchedulerKind::Immediate => (ImmediateScheduler::shared(), None),
            SchedulerKind::CurrentThread => (CurrentThreadScheduler::shared(), None),
            SchedulerKind::Queue => {
                let queue = Arc::new(QueueScheduler::new());
                let scheduler: SharedScheduler = queue.clone();
                (scheduler, Some(queue))
            }
        };
        tracing::debug!(
            message = "registration.built",
            exception_policy = ?config.exception_policy,
            scheduler = ?config.scheduler
        );
        Self {
            exception_handler: DefaultExceptionHandler::shared(config.exception_policy),
            main_thread_scheduler,
            main_queue,
        }
    }

    /// Build from [`RuntimeConfig::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_config(&RuntimeConfig::from_env())
    }

    /// Replace the exception sink.
    #[must_use]
    pub fn with_exception_handler(mut self, handler: SharedObserver<Error>) -> Self {
        self.exception_handler = handler;
        self
    }

    /// Replace the main-thread scheduler.
    #[must_use]
    pub fn with_main_thread_scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.main_thread_scheduler = scheduler;
        self.main_queue = None;
        self
    }

    /// The queue behind the main-thread scheduler, when it is a
    /// [`QueueScheduler`] created from configuration.
    #[must_use]
    pub fn main_queue(&self) -> Option<&Arc<QueueScheduler>> {
        self.main_queue.as_ref()
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("main_queue", &self.main_queue.is_some())
            .finish_non_exhaustive()
    }
}
