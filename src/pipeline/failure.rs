//! Failure event dispatch.
//!
//! Every recoverable failure (source metadata lookup, pass-through, engine
//! rendering) funnels through [`FailureDispatcher::dispatch`]. Registered
//! observers are invoked in registration order with the request and the
//! cause, and each returns a [`FailureAction`]:
//!
//! | Action          | Effect                                              |
//! |-----------------|-----------------------------------------------------|
//! | `Continue`      | nothing; the next observer runs                     |
//! | `Stop`          | forward to the next handler; later observers skipped|
//! | `Respond(resp)` | return `resp`; the first response wins              |
//!
//! A `Stop` takes precedence over any response attached before it. If no
//! observer handles the event the failure is propagated: as
//! [`PipelineError::ResponseFailure`] normally, or as
//! [`PipelineError::Failure`] carrying the original cause in debug mode.

use std::sync::Arc;

use axum::response::Response;
use tracing::{debug, error, warn};

use crate::error::{FailureCause, PipelineError};

use super::request::RequestView;

/// Name under which failure events are logged.
pub const RESPONSE_FAILURE_EVENT: &str = "imgpipe.response_failure";

/// A failure as seen by observers.
#[derive(Debug, Clone, Copy)]
pub struct FailureEvent<'a> {
    /// Request that failed
    pub request: &'a RequestView,

    /// What went wrong
    pub cause: &'a FailureCause,
}

/// What an observer wants done with a failure.
#[derive(Debug)]
pub enum FailureAction {
    Continue,
    Stop,
    Respond(Response),
}

/// Failure observer callback.
pub type FailureObserver = Arc<dyn Fn(&FailureEvent<'_>) -> FailureAction + Send + Sync>;

/// Outcome of a handled failure.
#[derive(Debug)]
pub enum Handled {
    /// Forward the request to the next handler
    Forward,

    /// Return this response unchanged
    Respond(Response),
}

/// Ordered registry of failure observers.
#[derive(Clone, Default)]
pub struct FailureDispatcher {
    observers: Vec<FailureObserver>,
    debug: bool,
}

impl std::fmt::Debug for FailureDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureDispatcher")
            .field("observers", &self.observers.len())
            .field("debug", &self.debug)
            .finish()
    }
}

impl FailureDispatcher {
    pub fn new(debug: bool) -> Self {
        Self {
            observers: Vec::new(),
            debug,
        }
    }

    /// Register an observer. Observers run in registration order.
    pub fn register<F>(&mut self, observer: F)
    where
        F: Fn(&FailureEvent<'_>) -> FailureAction + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Publish a failure and fold the observers' answers.
    pub fn dispatch(
        &self,
        request: &RequestView,
        cause: FailureCause,
    ) -> Result<Handled, PipelineError> {
        warn!(
            event = RESPONSE_FAILURE_EVENT,
            path = %request.path,
            cause = %cause,
            "Image response failed"
        );

        let event = FailureEvent {
            request,
            cause: &cause,
        };

        let mut attached: Option<Response> = None;
        for observer in &self.observers {
            match observer(&event) {
                FailureAction::Continue => {}
                FailureAction::Stop => {
                    debug!(path = %request.path, "Failure observer stopped the event");
                    return Ok(Handled::Forward);
                }
                FailureAction::Respond(response) => {
                    if attached.is_none() {
                        attached = Some(response);
                    }
                }
            }
        }

        if let Some(response) = attached {
            debug!(
                path = %request.path,
                status = response.status().as_u16(),
                "Failure observer supplied a response"
            );
            return Ok(Handled::Respond(response));
        }

        error!(
            event = RESPONSE_FAILURE_EVENT,
            path = %request.path,
            cause = %cause,
            "Unhandled image response failure"
        );

        if self.debug {
            Err(PipelineError::Failure(cause))
        } else {
            Err(PipelineError::ResponseFailure(cause))
        }
    }
}
