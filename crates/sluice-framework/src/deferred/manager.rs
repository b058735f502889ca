//! Running deferred results on the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use sluice_core::WebRequest;
use tracing::{debug, warn};

use super::callable::Callable;
use super::chain::{CallableInterceptorChain, ChainOutcome};
use super::interceptor::{CallableInterceptor, ConcurrentResult};
use crate::error::AsyncError;

/// How a deferred task ended.
#[derive(Debug)]
pub enum DeferredOutcome {
    /// The request continues with this result.
    Result(ConcurrentResult),
    /// An interceptor wrote the response; nothing more to do.
    ResponseHandled,
}

/// Spawns [`Callable`]s and drives their interceptor chain.
#[derive(Clone, Default)]
pub struct AsyncTaskManager {
    default_timeout: Option<Duration>,
    interceptors: Vec<Arc<dyn CallableInterceptor>>,
}

impl AsyncTaskManager {
    /// Creates a manager without timeout or interceptors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout applied to tasks that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Appends an interceptor applied to every task.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn CallableInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Returns the default timeout.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Runs `callable` on a spawned task and waits for its outcome.
    ///
    /// The callable's own interceptors run before the manager's. A timeout
    /// that no interceptor answers is an [`AsyncError::Timeout`]; a task
    /// that panics or is cancelled goes through the error hooks and, if no
    /// interceptor answers, completes with the failure as its result.
    pub async fn start_callable_processing(
        &self,
        request: Arc<WebRequest>,
        callable: Callable,
    ) -> Result<DeferredOutcome, AsyncError> {
        let (future, info, mut interceptors) = callable.into_parts();
        interceptors.extend(self.interceptors.iter().cloned());
        let timeout = info.timeout.or(self.default_timeout);
        let chain = Arc::new(CallableInterceptorChain::new(interceptors));

        chain
            .apply_before_concurrent_handling(&request, &info)
            .map_err(AsyncError::Rejected)?;

        debug!(task = %info.description, timeout = ?timeout, "Starting async task");
        let mut handle = tokio::spawn({
            let chain = chain.clone();
            let request = request.clone();
            let info = info.clone();
            async move {
                let result = match chain.apply_pre_process(&request, &info) {
                    Ok(()) => match future.await {
                        Ok(value) => ConcurrentResult::Value(value),
                        Err(e) => ConcurrentResult::Error(e),
                    },
                    Err(e) => ConcurrentResult::Error(e),
                };
                chain.apply_post_process(&request, &info, result)
            }
        });
        chain.set_task(handle.abort_handle());

        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut handle).await.ok(),
            None => Some((&mut handle).await),
        };

        let outcome = match joined {
            Some(Ok(result)) => Ok(DeferredOutcome::Result(result)),
            Some(Err(join_error)) => {
                let error = anyhow!("async task '{}' failed: {join_error}", info.description);
                warn!(task = %info.description, error = %error, "Async task failed");
                match chain.trigger_after_error(&request, &info, &error) {
                    Some(answer) => Ok(answer.into()),
                    None => Ok(DeferredOutcome::Result(ConcurrentResult::Error(error))),
                }
            }
            None => {
                warn!(task = %info.description, "Async task timed out");
                let answer = chain.trigger_after_timeout(&request, &info);
                // The abort lands at the task's next await; after_completion
                // must not overlap a hook still running on it.
                let _ = handle.await;
                match answer {
                    Some(answer) => Ok(answer.into()),
                    None => Err(AsyncError::Timeout {
                        task: info.description.clone(),
                        timeout_ms: timeout
                            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
                    }),
                }
            }
        };

        chain.trigger_after_completion(&request, &info);
        outcome
    }
}

impl From<ChainOutcome> for DeferredOutcome {
    fn from(outcome: ChainOutcome) -> Self {
        match outcome {
            ChainOutcome::ResponseHandled => Self::ResponseHandled,
            ChainOutcome::Result(result) => Self::Result(result),
        }
    }
}

impl std::fmt::Debug for AsyncTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTaskManager")
            .field("default_timeout", &self.default_timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
