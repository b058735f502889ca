//! Deferred (asynchronous) handler results.
//!
//! A handler may return a [`Callable`] instead of a value. The
//! [`AsyncTaskManager`] spawns it onto the tokio runtime and surrounds it
//! with [`CallableInterceptor`] hooks applied by a
//! [`CallableInterceptorChain`].

mod callable;
mod chain;
mod interceptor;
mod manager;

pub use callable::{Callable, CallableInfo};
pub use chain::{CallableInterceptorChain, ChainOutcome, ChainState};
pub use interceptor::{CallableInterceptor, ConcurrentResult, InterceptorOutcome};
pub use manager::{AsyncTaskManager, DeferredOutcome};
