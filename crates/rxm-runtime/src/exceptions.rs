#![forbid(unsafe_code)]

//! The sink that receives failures nobody subscribed to.

use std::sync::Arc;

use rxm_core::{Error, Observer, Result, SharedObserver};

use crate::config::ExceptionPolicy;

/// Default exception sink. Applies an [`ExceptionPolicy`] to every failure it
/// receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionHandler {
    policy: ExceptionPolicy,
}

impl DefaultExceptionHandler {
    /// Handler applying `policy`.
    #[must_use]
    pub fn new(policy: ExceptionPolicy) -> Self {
        Self { policy }
    }

    /// Shared handle for a [`Registration`](crate::Registration).
    #[must_use]
    pub fn shared(policy: ExceptionPolicy) -> SharedObserver<Error> {
        Arc::new(Self::new(policy))
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> ExceptionPolicy {
        self.policy
    }
}

impl Observer<Error> for DefaultExceptionHandler {
    fn on_next(&self, error: &Error) -> Result<()> {
        match self.policy {
            ExceptionPolicy::Log => {
                tracing::error!(message = "exception.unhandled", error = %error);
            }
            ExceptionPolicy::Panic => panic!("unhandled reactive exception: {error}"),
            ExceptionPolicy::Ignore => {}
        }
        Ok(())
    }
}
