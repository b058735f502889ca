//! Invoking handler methods against a request.

use std::fmt::Write as _;
use std::sync::Arc;

use sluice_core::{AttrValue, WebRequest};
use tracing::debug;

use super::method::{HandlerMethod, RawInvocation};
use super::resolvers::ArgumentResolverComposite;
use super::return_value::ReturnValue;
use crate::error::{InvocationError, InvocationResult};
use crate::model::ModelAndViewContainer;

/// A [`HandlerMethod`] paired with the resolvers that supply its arguments.
#[derive(Clone)]
pub struct InvocableHandlerMethod {
    method: Arc<HandlerMethod>,
    resolvers: Arc<ArgumentResolverComposite>,
}

impl InvocableHandlerMethod {
    /// Creates an invocable method.
    pub fn new(method: Arc<HandlerMethod>, resolvers: Arc<ArgumentResolverComposite>) -> Self {
        Self { method, resolvers }
    }

    /// Returns the underlying method.
    pub fn method(&self) -> &Arc<HandlerMethod> {
        &self.method
    }

    /// Resolves the arguments and invokes the method.
    ///
    /// `provided` values take precedence over resolvers: a parameter is bound
    /// to the first provided value of its exact declared type.
    pub fn invoke_for_request(
        &self,
        request: &WebRequest,
        container: &mut ModelAndViewContainer,
        provided: &[AttrValue],
    ) -> InvocationResult<ReturnValue> {
        let args = self.method_argument_values(request, container, provided)?;
        self.do_invoke(&args)
    }

    /// Resolves every argument of the method in declaration order.
    pub fn method_argument_values(
        &self,
        request: &WebRequest,
        container: &mut ModelAndViewContainer,
        provided: &[AttrValue],
    ) -> InvocationResult<Vec<AttrValue>> {
        let mut args = Vec::with_capacity(self.method.parameters().len());

        for parameter in self.method.parameters() {
            if let Some(value) = provided.iter().find(|value| parameter.accepts(value)) {
                args.push(value.clone());
                continue;
            }

            let Some(resolver) = self.resolvers.resolver_for(parameter) else {
                return Err(InvocationError::ArgumentResolution {
                    index: parameter.index(),
                    type_name: parameter.type_name(),
                    method: self.method.short_description(),
                    reason: "no suitable resolver".to_string(),
                });
            };

            match resolver.resolve_argument(parameter, container, request) {
                Ok(value) => args.push(value),
                Err(source) => {
                    debug!(
                        method = %self.method,
                        index = parameter.index(),
                        error = %source,
                        "Failed to resolve argument"
                    );
                    return Err(InvocationError::Resolver {
                        index: parameter.index(),
                        type_name: parameter.type_name(),
                        method: self.method.short_description(),
                        source,
                    });
                }
            }
        }

        Ok(args)
    }

    fn do_invoke(&self, args: &[AttrValue]) -> InvocationResult<ReturnValue> {
        if self.method.bean_type() != self.method.declared_type() {
            return Err(InvocationError::TargetMismatch {
                method: self.method.short_description(),
                expected: self.method.declared_type_name(),
                actual: self.method.bean_type_name(),
            });
        }

        match self.method.call(args) {
            RawInvocation::Returned(result) => result.map_err(InvocationError::Handler),
            RawInvocation::TargetMismatch => Err(InvocationError::TargetMismatch {
                method: self.method.short_description(),
                expected: self.method.declared_type_name(),
                actual: self.method.bean_type_name(),
            }),
            RawInvocation::ArgumentMismatch(index) => Err(InvocationError::illegal_state(
                self.invocation_error_message(&format!("argument [{index}] has the wrong type"), args),
            )),
        }
    }

    fn invocation_error_message(&self, text: &str, args: &[AttrValue]) -> String {
        let mut message = format!("{text}\nHandler method [{}] with argument values:", self.method);
        for (i, arg) in args.iter().enumerate() {
            let _ = write!(message, "\n [{i}] [type={}] [value={arg:?}]", arg.type_name());
        }
        message
    }
}

impl std::fmt::Debug for InvocableHandlerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocableHandlerMethod")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::handler::parameter::{Arg, MethodParameter, ParamAnnotation};
    use crate::handler::resolvers::ArgumentResolver;

    #[derive(Debug, Default)]
    struct Greeter;

    #[derive(Debug, thiserror::Error)]
    #[error("greeting refused")]
    struct Refused;

    /// Supplies `String` arguments and counts its calls.
    #[derive(Default)]
    struct StringResolver {
        calls: AtomicUsize,
    }

    impl ArgumentResolver for StringResolver {
        fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
            parameter.annotation() == ParamAnnotation::None
        }

        fn resolve_argument(
            &self,
            _parameter: &MethodParameter,
            _container: &mut ModelAndViewContainer,
            _request: &WebRequest,
        ) -> anyhow::Result<AttrValue> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AttrValue::from("resolved"))
        }
    }

    fn greet(_: &Greeter, name: Arg<String>) -> String {
        format!("hello {}", *name)
    }

    fn invocable(method: HandlerMethod, resolvers: ArgumentResolverComposite) -> InvocableHandlerMethod {
        InvocableHandlerMethod::new(Arc::new(method), Arc::new(resolvers))
    }

    #[test]
    fn test_provided_values_take_precedence() {
        let method = HandlerMethod::new(Arc::new(Greeter), "greet", greet);
        let invocable = invocable(
            method,
            ArgumentResolverComposite::new().with_resolver(StringResolver::default()),
        );
        let mut container = ModelAndViewContainer::new();
        let request = WebRequest::new("/");

        let value = invocable
            .invoke_for_request(&request, &mut container, &[AttrValue::from("provided")])
            .unwrap();
        assert!(matches!(value, ReturnValue::ViewName(name) if name == "hello provided"));

        let value = invocable
            .invoke_for_request(&request, &mut container, &[])
            .unwrap();
        assert!(matches!(value, ReturnValue::ViewName(name) if name == "hello resolved"));
    }

    #[test]
    fn test_unresolvable_parameter_names_index_and_type() {
        let method = HandlerMethod::new(Arc::new(Greeter), "greet", greet);
        let invocable = invocable(method, ArgumentResolverComposite::new());

        let err = invocable
            .invoke_for_request(&WebRequest::new("/"), &mut ModelAndViewContainer::new(), &[])
            .unwrap_err();
        match err {
            InvocationError::ArgumentResolution {
                index,
                type_name,
                method,
                ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(type_name, std::any::type_name::<String>());
                assert_eq!(method, "Greeter::greet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_handler_fault_is_not_wrapped() {
        let method = HandlerMethod::new(Arc::new(Greeter), "refuse", |_: &Greeter| {
            Err::<String, _>(Refused)
        });
        let invocable = invocable(method, ArgumentResolverComposite::new());

        let err = invocable
            .invoke_for_request(&WebRequest::new("/"), &mut ModelAndViewContainer::new(), &[])
            .unwrap_err();
        let fault = err.handler_error().expect("handler fault");
        assert!(fault.downcast_ref::<Refused>().is_some());
        assert_eq!(err.to_string(), "greeting refused");
    }

    #[test]
    fn test_target_mismatch() {
        let method = HandlerMethod::new(Arc::new(Greeter), "greet", greet)
            .with_bean(Arc::new(String::from("proxy")));
        let invocable = invocable(method, ArgumentResolverComposite::new());

        let err = invocable
            .invoke_for_request(
                &WebRequest::new("/"),
                &mut ModelAndViewContainer::new(),
                &[AttrValue::from("x")],
            )
            .unwrap_err();
        assert!(matches!(err, InvocationError::TargetMismatch { .. }));
    }

    #[test]
    fn test_wrong_resolved_type_is_illegal_state() {
        struct NumberResolver;

        impl ArgumentResolver for NumberResolver {
            fn supports_parameter(&self, _parameter: &MethodParameter) -> bool {
                true
            }

            fn resolve_argument(
                &self,
                _parameter: &MethodParameter,
                _container: &mut ModelAndViewContainer,
                _request: &WebRequest,
            ) -> anyhow::Result<AttrValue> {
                Ok(AttrValue::from(5i32))
            }
        }

        let method = HandlerMethod::new(Arc::new(Greeter), "greet", greet);
        let invocable = invocable(method, ArgumentResolverComposite::new().with_resolver(NumberResolver));

        let err = invocable
            .invoke_for_request(&WebRequest::new("/"), &mut ModelAndViewContainer::new(), &[])
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, InvocationError::IllegalState { .. }));
        assert!(message.contains("[0] [type=i32] [value=5]"));
    }
}
