//! Handler methods, their arguments and their return values.
//!
//! This module contains the invocation half of the pipeline:
//!
//! - **Parameters** ([`parameter`]): argument types implementing
//!   [`FromArgument`] and the [`MethodParameter`] descriptors they produce
//! - **Methods** ([`method`]): the [`Handler`] trait implemented for plain
//!   functions by arity, and [`HandlerMethod`] binding one to a bean
//! - **Resolvers** ([`resolvers`]): pluggable [`ArgumentResolver`]s
//! - **Invocation** ([`invocable`]): [`InvocableHandlerMethod`], which resolves
//!   arguments (provided values first) and calls the method
//! - **Return values** ([`return_value`], [`return_handlers`]): conversion of
//!   whatever the function returned and the handlers that interpret it

pub mod invocable;
pub mod method;
pub mod parameter;
pub mod resolvers;
pub mod return_handlers;
pub mod return_value;

pub use invocable::InvocableHandlerMethod;
pub use method::{Bean, Handler, HandlerMethod};
pub use parameter::{
    Arg, FromArgument, MethodParameter, ModelAttribute, ParamAnnotation, PathVariable,
    RequestParam, SessionAttribute,
};
pub use resolvers::{
    ArgumentResolver, ArgumentResolverComposite, ModelAttributeResolver, ModelResolver,
    PathVariableResolver, RequestParamResolver, SessionAttributeResolver, SessionStatusResolver,
};
pub use return_handlers::{
    ModelAndViewHandler, ModelAttributeHandler, ResponseBodyHandler, ReturnValueHandler,
    ReturnValueHandlerComposite, ViewHandler, ViewNameHandler, VoidHandler,
};
pub use return_value::{Attribute, IntoReturnValue, ResponseBody, ReturnType, ReturnValue};
