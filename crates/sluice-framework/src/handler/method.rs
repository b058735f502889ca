//! Handler functions and the methods built from them.
//!
//! A handler is a plain function or closure taking the controller bean by
//! reference followed by up to 16 arguments implementing [`FromArgument`]:
//!
//! ```rust,ignore
//! fn show(books: &BookController, id: PathVariable<u64>) -> anyhow::Result<Attribute<Book>> {
//!     books.find(*id).map(Attribute)
//! }
//!
//! let method = HandlerMethod::new(controller, "show", show).param_name(0, "id");
//! ```
//!
//! The [`Handler`] trait is implemented for such functions by arity, in the
//! same way extractor-based web frameworks do, and yields the parameter
//! descriptor list at registration time.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use sluice_core::{AttrValue, MediaType};

use super::parameter::{FromArgument, MethodParameter};
use super::return_value::{IntoReturnValue, ReturnType, ReturnValue};

/// The controller instance a method is bound to.
pub type Bean = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Handler Trait
// ============================================================================

/// Functions usable as handler methods on a bean of type `B`.
///
/// Implemented for `Fn(&B, T1, ..., Tn) -> R` where every `Ti` implements
/// [`FromArgument`] and `R` implements [`IntoReturnValue`].
pub trait Handler<B, Args>: Clone + Send + Sync + 'static {
    /// The function's return type.
    type Output: IntoReturnValue;

    /// Describes the parameters in declaration order.
    fn parameters() -> Vec<MethodParameter>;

    /// Calls the function.
    ///
    /// Returns the index of the first argument whose value does not have the
    /// declared type.
    fn call(&self, bean: &B, args: &[AttrValue]) -> Result<Self::Output, usize>;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, B, R, $($ty,)*> Handler<B, ($($ty,)*)> for F
        where
            F: Fn(&B, $($ty,)*) -> R + Clone + Send + Sync + 'static,
            B: Send + Sync + 'static,
            R: IntoReturnValue,
            $( $ty: FromArgument, )*
        {
            type Output = R;

            fn parameters() -> Vec<MethodParameter> {
                let mut index = 0usize;
                let mut parameters = Vec::new();
                $(
                    parameters.push($ty::parameter(index));
                    index += 1;
                )*
                parameters
            }

            fn call(&self, bean: &B, args: &[AttrValue]) -> Result<R, usize> {
                let mut values = args.iter();
                let mut index = 0usize;
                $(
                    let $ty = values.next().and_then($ty::from_value).ok_or(index)?;
                    index += 1;
                )*

                Ok((self)(bean, $($ty,)*))
            }
        }
    };
}

// Generate implementations for 0-16 parameters
impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

// ============================================================================
// HandlerMethod
// ============================================================================

/// Raw outcome of calling the bound function.
pub(crate) enum RawInvocation {
    /// The function ran.
    Returned(anyhow::Result<ReturnValue>),
    /// The bound bean is not of the declared type.
    TargetMismatch,
    /// The argument at this index had the wrong type.
    ArgumentMismatch(usize),
}

type Invoker = Arc<dyn Fn(&(dyn Any + Send + Sync), &[AttrValue]) -> RawInvocation + Send + Sync>;

/// A handler function bound to a bean, with its parameter descriptors.
#[derive(Clone)]
pub struct HandlerMethod {
    bean: Bean,
    bean_type_name: &'static str,
    declared_type: TypeId,
    declared_type_name: &'static str,
    method_name: String,
    parameters: Vec<MethodParameter>,
    return_type: ReturnType,
    invoker: Invoker,
    model_attribute_name: Option<String>,
    binding: bool,
    produces: Vec<MediaType>,
}

impl HandlerMethod {
    /// Binds `handler` to `bean` under `method_name`.
    pub fn new<B, Args, F>(bean: Arc<B>, method_name: impl Into<String>, handler: F) -> Self
    where
        B: Send + Sync + 'static,
        Args: 'static,
        F: Handler<B, Args>,
    {
        let invoker: Invoker = Arc::new(
            move |bean: &(dyn Any + Send + Sync), args: &[AttrValue]| match bean.downcast_ref::<B>() {
                Some(bean) => match handler.call(bean, args) {
                    Ok(output) => RawInvocation::Returned(output.into_return_value()),
                    Err(index) => RawInvocation::ArgumentMismatch(index),
                },
                None => RawInvocation::TargetMismatch,
            },
        );

        Self {
            bean,
            bean_type_name: std::any::type_name::<B>(),
            declared_type: TypeId::of::<B>(),
            declared_type_name: std::any::type_name::<B>(),
            method_name: method_name.into(),
            parameters: F::parameters(),
            return_type: <F::Output as IntoReturnValue>::return_type(),
            invoker,
            model_attribute_name: None,
            binding: true,
            produces: Vec::new(),
        }
    }

    // ─── Registration-time configuration ─────────────────────────────────────

    fn parameter_mut(&mut self, index: usize) -> Option<&mut MethodParameter> {
        self.parameters.get_mut(index)
    }

    /// Names the parameter at `index` (path variable, request parameter or attribute name).
    pub fn param_name(mut self, index: usize, name: impl Into<String>) -> Self {
        if let Some(param) = self.parameter_mut(index) {
            param.set_name(name);
        }
        self
    }

    /// Sets the default raw value of the parameter at `index`.
    pub fn param_default(mut self, index: usize, value: impl Into<String>) -> Self {
        if let Some(param) = self.parameter_mut(index) {
            param.set_default_value(value);
        }
        self
    }

    /// Enables or disables data binding for a model attribute parameter.
    pub fn param_binding(mut self, index: usize, binding: bool) -> Self {
        if let Some(param) = self.parameter_mut(index) {
            param.set_binding(binding);
        }
        self
    }

    /// Names the model attribute the return value is stored under.
    pub fn model_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.model_attribute_name = Some(name.into());
        self
    }

    /// Enables or disables data binding for the returned model attribute.
    pub fn binding(mut self, binding: bool) -> Self {
        self.binding = binding;
        self
    }

    /// Declares a media type the method produces.
    pub fn produces(mut self, media_type: MediaType) -> Self {
        self.produces.push(media_type);
        self
    }

    /// Returns a copy bound to another bean.
    ///
    /// The declared type is kept, so invoking the copy fails with a target
    /// mismatch if `bean` is of a different type.
    pub fn with_bean<T: Any + Send + Sync>(&self, bean: Arc<T>) -> Self {
        Self {
            bean,
            bean_type_name: std::any::type_name::<T>(),
            ..self.clone()
        }
    }

    /// Returns a copy bound to the same bean as `other`.
    pub fn rebind(&self, other: &HandlerMethod) -> Self {
        Self {
            bean: other.bean.clone(),
            bean_type_name: other.bean_type_name,
            ..self.clone()
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// Returns the bound bean.
    pub fn bean(&self) -> &Bean {
        &self.bean
    }

    /// Returns the type id of the bound bean.
    pub fn bean_type(&self) -> TypeId {
        Any::type_id(&*self.bean)
    }

    /// Returns the type name of the bound bean.
    pub fn bean_type_name(&self) -> &'static str {
        self.bean_type_name
    }

    /// Returns the type the method was declared on.
    pub fn declared_type(&self) -> TypeId {
        self.declared_type
    }

    /// Returns the name of the type the method was declared on.
    pub fn declared_type_name(&self) -> &'static str {
        self.declared_type_name
    }

    /// Returns the method name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Returns the parameters in declaration order.
    pub fn parameters(&self) -> &[MethodParameter] {
        &self.parameters
    }

    /// Returns the declared return type.
    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    /// Returns `true` if the method returns nothing.
    pub fn is_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Returns the explicit model attribute name for the return value.
    pub fn return_attribute_name(&self) -> Option<&str> {
        self.model_attribute_name.as_deref()
    }

    /// Returns `false` if binding is disabled for the returned attribute.
    pub fn is_binding(&self) -> bool {
        self.binding
    }

    /// Returns the media types the method produces.
    pub fn produced_media_types(&self) -> &[MediaType] {
        &self.produces
    }

    /// Returns `Type::method` for diagnostics.
    pub fn short_description(&self) -> String {
        let short = self
            .declared_type_name
            .rsplit("::")
            .next()
            .unwrap_or(self.declared_type_name);
        format!("{short}::{}", self.method_name)
    }

    pub(crate) fn call(&self, args: &[AttrValue]) -> RawInvocation {
        (self.invoker)(&*self.bean, args)
    }
}

impl fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("method", &self.short_description())
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::parameter::{Arg, ParamAnnotation, PathVariable};

    #[derive(Debug)]
    struct Counter {
        base: u64,
    }

    fn add(counter: &Counter, n: PathVariable<u64>) -> String {
        format!("{}", counter.base + *n)
    }

    #[test]
    fn test_parameters_from_signature() {
        let method = HandlerMethod::new(Arc::new(Counter { base: 1 }), "add", add).param_name(0, "n");

        assert_eq!(method.parameters().len(), 1);
        assert_eq!(method.parameters()[0].name(), Some("n"));
        assert_eq!(method.parameters()[0].annotation(), ParamAnnotation::PathVariable);
        assert_eq!(method.short_description(), "Counter::add");
        assert!(!method.is_void());
    }

    #[test]
    fn test_call_and_mismatches() {
        let method = HandlerMethod::new(Arc::new(Counter { base: 1 }), "add", add);

        match method.call(&[AttrValue::from(41u64)]) {
            RawInvocation::Returned(Ok(ReturnValue::ViewName(name))) => assert_eq!(name, "42"),
            _ => panic!("expected a view name"),
        }
        assert!(matches!(
            method.call(&[AttrValue::from("41")]),
            RawInvocation::ArgumentMismatch(0)
        ));

        let rebound = method.with_bean(Arc::new(String::from("not a counter")));
        assert!(matches!(
            rebound.call(&[AttrValue::from(1u64)]),
            RawInvocation::TargetMismatch
        ));
    }

    #[test]
    fn test_closure_handlers() {
        let method = HandlerMethod::new(
            Arc::new(Counter { base: 0 }),
            "noop",
            |_: &Counter, _: Arg<String>| {},
        );
        assert!(method.is_void());
        assert!(matches!(
            method.call(&[AttrValue::from("x")]),
            RawInvocation::Returned(Ok(ReturnValue::Void))
        ));
    }
}
