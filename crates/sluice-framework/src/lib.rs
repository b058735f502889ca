//! # Sluice Framework
//!
//! The dispatch pipeline stages built on top of the core types.
//!
//! This layer provides:
//! - URL pattern registry and handler resolution ([`mapping`])
//! - Handler methods with typed arguments and return values ([`handler`])
//! - Model population and session-managed attributes ([`model`])
//! - View resolution by content negotiation ([`negotiation`])
//! - Deferred results with interceptor hooks ([`deferred`])
//! - The [`HandlerAdapter`] running a handler method end to end
//!
//! A transport layer or the runtime resolves a handler through a
//! [`UrlHandlerMapping`], runs it with the [`HandlerAdapter`] and resolves
//! the resulting view name with a [`ContentNegotiatingViewResolver`].

pub mod adapter;
pub mod deferred;
pub mod error;
pub mod handler;
pub mod mapping;
pub mod model;
pub mod negotiation;

pub use adapter::{Controller, HandlerAdapter};
pub use deferred::{AsyncTaskManager, Callable, CallableInterceptor, DeferredOutcome};
pub use error::{
    AsyncError, HandlingError, HandlingResult, InvocationError, InvocationResult, MappingError,
    MappingResult, ModelError, ModelResult, NegotiationError, ReturnValueError,
};
pub use handler::{HandlerMethod, IntoReturnValue, ReturnValue};
pub use mapping::{HandlerMatch, HandlerRef, Resolution, UrlHandlerMapping};
pub use model::{ModelAndView, ModelMap, SessionAttributes, SessionStatus};
pub use negotiation::{
    ContentNegotiatingViewResolver, ContentNegotiationManager, NegotiationResult, View,
    ViewResolver,
};

/// Prelude for writing controllers.
pub mod prelude {
    pub use super::adapter::Controller;
    pub use super::deferred::Callable;
    pub use super::handler::{
        Arg, Attribute, ModelAttribute, PathVariable, RequestParam, ResponseBody,
        SessionAttribute,
    };
    pub use super::model::{ModelAndView, ModelMap, SessionAttributes, SessionStatus};
    pub use super::negotiation::{BoxedView, FnView, View};
}
