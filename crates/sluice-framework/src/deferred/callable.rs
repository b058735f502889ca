//! Deferred handler results.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::interceptor::CallableInterceptor;
use crate::handler::{IntoReturnValue, ReturnValue};

/// Describes a deferred task to interceptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableInfo {
    /// Human readable task name.
    pub description: String,
    /// Task-specific timeout, overriding the manager default.
    pub timeout: Option<Duration>,
}

/// A handler result computed asynchronously.
///
/// The wrapped future's output goes through [`IntoReturnValue`], so a
/// future returning `anyhow::Result<String>` yields a view name.
///
/// ```
/// use std::time::Duration;
/// use sluice_framework::deferred::Callable;
///
/// let task = Callable::new(async { Ok::<_, anyhow::Error>("books/list") })
///     .with_timeout(Duration::from_secs(5))
///     .described("load books");
/// assert_eq!(task.info().description, "load books");
/// ```
pub struct Callable {
    future: BoxFuture<'static, anyhow::Result<ReturnValue>>,
    timeout: Option<Duration>,
    interceptors: Vec<Arc<dyn CallableInterceptor>>,
    description: String,
}

impl Callable {
    /// Wraps a future.
    pub fn new<F, R>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
        R: IntoReturnValue,
    {
        Self {
            future: async move { future.await.into_return_value() }.boxed(),
            timeout: None,
            interceptors: Vec::new(),
            description: "callable".to_string(),
        }
    }

    /// Sets a timeout for this task only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds an interceptor that runs before the manager's interceptors.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn CallableInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Names the task in logs and errors.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the task description and timeout.
    pub fn info(&self) -> CallableInfo {
        CallableInfo {
            description: self.description.clone(),
            timeout: self.timeout,
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BoxFuture<'static, anyhow::Result<ReturnValue>>,
        CallableInfo,
        Vec<Arc<dyn CallableInterceptor>>,
    ) {
        let info = self.info();
        (self.future, info, self.interceptors)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_converted_to_return_value() {
        let (future, info, interceptors) = Callable::new(async { "books/list" }).into_parts();
        assert_eq!(info.description, "callable");
        assert!(info.timeout.is_none());
        assert!(interceptors.is_empty());

        let value = tokio_test::block_on(future).unwrap();
        assert!(matches!(value, ReturnValue::ViewName(ref name) if name == "books/list"));
    }

    #[test]
    fn test_error_output_stays_an_error() {
        let callable = Callable::new(async { Err::<String, _>(std::io::Error::other("gone")) });
        let (future, _, _) = callable.into_parts();
        let err = tokio_test::block_on(future).unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
