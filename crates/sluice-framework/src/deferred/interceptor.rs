//! Hooks around deferred result processing.

use sluice_core::WebRequest;

use super::callable::CallableInfo;
use crate::handler::ReturnValue;

/// The value a deferred task completed with.
#[derive(Debug)]
pub enum ConcurrentResult {
    /// The task produced a return value.
    Value(ReturnValue),
    /// The task, or an interceptor around it, failed.
    Error(anyhow::Error),
}

impl ConcurrentResult {
    /// Returns `true` for [`ConcurrentResult::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Answer of a timeout or error hook.
#[derive(Debug)]
pub enum InterceptorOutcome {
    /// Let the next interceptor decide.
    NoResult,
    /// The interceptor wrote the response itself; stop processing.
    ResponseHandled,
    /// Complete the request with this value.
    Value(ReturnValue),
}

/// Intercepts the processing of a [`Callable`](super::Callable).
///
/// Every hook has a no-op default. Hooks returning an error are handled
/// according to the phase they run in; see
/// [`CallableInterceptorChain`](super::CallableInterceptorChain).
pub trait CallableInterceptor: Send + Sync {
    /// Runs on the request task before the callable is spawned. An error
    /// aborts scheduling.
    fn before_concurrent_handling(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
    ) -> anyhow::Result<()> {
        let _ = (request, task);
        Ok(())
    }

    /// Runs on the spawned task before the callable starts.
    fn pre_process(&self, request: &WebRequest, task: &CallableInfo) -> anyhow::Result<()> {
        let _ = (request, task);
        Ok(())
    }

    /// Runs on the spawned task after the callable finished.
    fn post_process(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
        result: &ConcurrentResult,
    ) -> anyhow::Result<()> {
        let _ = (request, task, result);
        Ok(())
    }

    /// Runs when the callable did not finish within its timeout.
    fn handle_timeout(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
    ) -> anyhow::Result<InterceptorOutcome> {
        let _ = (request, task);
        Ok(InterceptorOutcome::NoResult)
    }

    /// Runs when the callable's task died without producing a result.
    fn handle_error(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
        error: &anyhow::Error,
    ) -> anyhow::Result<InterceptorOutcome> {
        let _ = (request, task, error);
        Ok(InterceptorOutcome::NoResult)
    }

    /// Runs once processing is over, whatever the outcome.
    fn after_completion(&self, request: &WebRequest, task: &CallableInfo) -> anyhow::Result<()> {
        let _ = (request, task);
        Ok(())
    }
}
