//! Ordered application of callable interceptors.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use sluice_core::WebRequest;
use tokio::task::AbortHandle;
use tracing::{error, trace};

use super::callable::CallableInfo;
use super::interceptor::{CallableInterceptor, ConcurrentResult, InterceptorOutcome};

/// Lifecycle of a [`CallableInterceptorChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// No hook has run yet, or only `before_concurrent_handling`.
    NotStarted,
    /// `pre_process` succeeded for this many interceptors.
    PreProcessed(usize),
    /// `post_process` ran.
    Completed,
    /// The timeout hooks ran.
    TimedOut,
    /// The error hooks ran.
    Errored,
}

/// Outcome of the timeout and error hooks when some interceptor answered.
#[derive(Debug)]
pub enum ChainOutcome {
    /// An interceptor wrote the response.
    ResponseHandled,
    /// An interceptor supplied a result, or failed and its error is the result.
    Result(ConcurrentResult),
}

/// Applies interceptors around one deferred task.
///
/// - `before_concurrent_handling` and `pre_process` run in order and stop at
///   the first error.
/// - `post_process` runs in reverse over the interceptors whose
///   `pre_process` succeeded; all of them run, the first error replaces the
///   result and later errors are logged.
/// - `handle_timeout` and `handle_error` cancel the task, then run in order
///   until one answers.
/// - `after_completion` runs in reverse for every interceptor; errors are
///   logged.
pub struct CallableInterceptorChain {
    interceptors: Vec<Arc<dyn CallableInterceptor>>,
    pre_processed: AtomicUsize,
    state: Mutex<ChainState>,
    task: Mutex<Option<AbortHandle>>,
}

impl CallableInterceptorChain {
    /// Creates a chain.
    pub fn new(interceptors: Vec<Arc<dyn CallableInterceptor>>) -> Self {
        Self {
            interceptors,
            pre_processed: AtomicUsize::new(0),
            state: Mutex::new(ChainState::NotStarted),
            task: Mutex::new(None),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ChainState {
        *self.state.lock()
    }

    /// Returns the number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns `true` if the chain has no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Registers the running task so timeout and error handling can cancel it.
    pub fn set_task(&self, handle: AbortHandle) {
        *self.task.lock() = Some(handle);
    }

    /// Runs `before_concurrent_handling` in order. The first error is
    /// returned and the task must not be scheduled.
    pub fn apply_before_concurrent_handling(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
    ) -> anyhow::Result<()> {
        for interceptor in &self.interceptors {
            interceptor.before_concurrent_handling(request, task)?;
        }
        Ok(())
    }

    /// Runs `pre_process` in order, stopping at the first error. Only the
    /// interceptors that succeeded see `post_process`.
    pub fn apply_pre_process(&self, request: &WebRequest, task: &CallableInfo) -> anyhow::Result<()> {
        for interceptor in &self.interceptors {
            interceptor.pre_process(request, task)?;
            let count = self.pre_processed.fetch_add(1, Ordering::AcqRel) + 1;
            *self.state.lock() = ChainState::PreProcessed(count);
        }
        Ok(())
    }

    /// Runs `post_process` and returns the result to complete with.
    pub fn apply_post_process(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
        result: ConcurrentResult,
    ) -> ConcurrentResult {
        let processed = self.pre_processed.load(Ordering::Acquire);
        let mut first_error = None;
        for interceptor in self.interceptors[..processed].iter().rev() {
            if let Err(e) = interceptor.post_process(request, task, &result) {
                if first_error.is_some() {
                    error!(task = %task.description, error = %e, "Post-process interceptor failed");
                } else {
                    first_error = Some(e);
                }
            }
        }
        *self.state.lock() = ChainState::Completed;

        match first_error {
            Some(e) => ConcurrentResult::Error(e),
            None => result,
        }
    }

    /// Cancels the task and asks interceptors for a timeout result.
    ///
    /// Returns `None` if no interceptor answered.
    pub fn trigger_after_timeout(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
    ) -> Option<ChainOutcome> {
        self.cancel_task();
        *self.state.lock() = ChainState::TimedOut;
        self.first_responder(|interceptor| interceptor.handle_timeout(request, task))
    }

    /// Cancels the task and asks interceptors for an error result.
    ///
    /// Returns `None` if no interceptor answered.
    pub fn trigger_after_error(
        &self,
        request: &WebRequest,
        task: &CallableInfo,
        error: &anyhow::Error,
    ) -> Option<ChainOutcome> {
        self.cancel_task();
        *self.state.lock() = ChainState::Errored;
        self.first_responder(|interceptor| interceptor.handle_error(request, task, error))
    }

    /// Runs `after_completion` in reverse for every interceptor. Errors are
    /// logged and never stop the chain.
    pub fn trigger_after_completion(&self, request: &WebRequest, task: &CallableInfo) {
        for interceptor in self.interceptors.iter().rev() {
            if let Err(e) = interceptor.after_completion(request, task) {
                error!(task = %task.description, error = %e, "After-completion interceptor failed");
            }
        }
    }

    fn first_responder<F>(&self, mut hook: F) -> Option<ChainOutcome>
    where
        F: FnMut(&dyn CallableInterceptor) -> anyhow::Result<InterceptorOutcome>,
    {
        for interceptor in &self.interceptors {
            match hook(interceptor.as_ref()) {
                Ok(InterceptorOutcome::NoResult) => continue,
                Ok(InterceptorOutcome::ResponseHandled) => return Some(ChainOutcome::ResponseHandled),
                Ok(InterceptorOutcome::Value(value)) => {
                    return Some(ChainOutcome::Result(ConcurrentResult::Value(value)));
                }
                Err(e) => return Some(ChainOutcome::Result(ConcurrentResult::Error(e))),
            }
        }
        None
    }

    fn cancel_task(&self) {
        if let Some(handle) = self.task.lock().take() {
            trace!("Cancelling async task");
            handle.abort();
        }
    }
}

impl std::fmt::Debug for CallableInterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableInterceptorChain")
            .field("interceptors", &self.interceptors.len())
            .field("state", &self.state())
            .finish()
    }
}
