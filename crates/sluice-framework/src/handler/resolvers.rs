//! Argument resolvers.
//!
//! A resolver turns a [`MethodParameter`] into a value using the request and
//! the current [`ModelAndViewContainer`]. Resolvers are consulted in
//! registration order through an [`ArgumentResolverComposite`]; the first one
//! that supports a parameter resolves it.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use sluice_core::{AttrValue, WebRequest};
use tracing::trace;

use super::parameter::{MethodParameter, ParamAnnotation};
use crate::model::ModelAndViewContainer;

/// Resolves handler arguments of the parameters it supports.
pub trait ArgumentResolver: Send + Sync {
    /// Returns `true` if this resolver can resolve `parameter`.
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool;

    /// Resolves the argument value.
    fn resolve_argument(
        &self,
        parameter: &MethodParameter,
        container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<AttrValue>;
}

/// An ordered list of resolvers.
#[derive(Clone, Default)]
pub struct ArgumentResolverComposite {
    resolvers: Vec<Arc<dyn ArgumentResolver>>,
}

impl ArgumentResolverComposite {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a composite holding the built-in resolvers.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_resolver(PathVariableResolver)
            .with_resolver(RequestParamResolver)
            .with_resolver(ModelAttributeResolver)
            .with_resolver(SessionAttributeResolver)
            .with_resolver(SessionStatusResolver)
            .with_resolver(ModelResolver)
    }

    /// Appends a resolver.
    pub fn with_resolver(mut self, resolver: impl ArgumentResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Appends a shared resolver.
    pub fn add_resolver(&mut self, resolver: Arc<dyn ArgumentResolver>) {
        self.resolvers.push(resolver);
    }

    /// Returns the number of resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns `true` if no resolver is registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Returns the first resolver supporting `parameter`.
    pub fn resolver_for(&self, parameter: &MethodParameter) -> Option<&Arc<dyn ArgumentResolver>> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.supports_parameter(parameter))
    }

    /// Returns `true` if any resolver supports `parameter`.
    pub fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        self.resolver_for(parameter).is_some()
    }
}

// =============================================================================
// Built-in resolvers
// =============================================================================

fn convert_raw(parameter: &MethodParameter, kind: &str, name: &str, raw: &str) -> anyhow::Result<AttrValue> {
    parameter.convert(raw).ok_or_else(|| {
        anyhow!(
            "failed to convert {kind} '{name}' value '{raw}' to [{}]",
            parameter.type_name()
        )
    })
}

/// Resolves [`PathVariable`](super::PathVariable) arguments from the URI
/// template variables of the matched pattern.
///
/// Unnamed parameters bind to the only variable when exactly one exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathVariableResolver;

impl ArgumentResolver for PathVariableResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.annotation() == ParamAnnotation::PathVariable
    }

    fn resolve_argument(
        &self,
        parameter: &MethodParameter,
        _container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        let variables = request.uri_template_variables();
        let (name, raw) = match parameter.name() {
            Some(name) => (name.to_string(), variables.get(name).cloned()),
            None if variables.len() == 1 => {
                let (name, value) = variables.into_iter().next().unwrap_or_default();
                (name, Some(value))
            }
            None => bail!(
                "path variable parameter [{}] has no name and the match exposes {} variables",
                parameter.index(),
                variables.len()
            ),
        };

        let raw = raw
            .or_else(|| parameter.default_value().map(str::to_string))
            .ok_or_else(|| anyhow!("missing URI template variable '{name}'"))?;
        convert_raw(parameter, "path variable", &name, &raw)
    }
}

/// Resolves [`RequestParam`](super::RequestParam) arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParamResolver;

impl ArgumentResolver for RequestParamResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.annotation() == ParamAnnotation::RequestParam
    }

    fn resolve_argument(
        &self,
        parameter: &MethodParameter,
        _container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        let Some(name) = parameter.name() else {
            bail!("request parameter [{}] has no name", parameter.index());
        };
        let raw = request
            .parameter(name)
            .or(parameter.default_value())
            .ok_or_else(|| anyhow!("required request parameter '{name}' is not present"))?;
        convert_raw(parameter, "request parameter", name, raw)
    }
}

/// Resolves [`ModelAttribute`](super::ModelAttribute) arguments.
///
/// The attribute is taken from the model when present, otherwise created
/// with the parameter's factory and added to the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelAttributeResolver;

impl ArgumentResolver for ModelAttributeResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.is_model_attribute()
    }

    fn resolve_argument(
        &self,
        parameter: &MethodParameter,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        let name = parameter.attribute_name();
        if parameter.annotation() == (ParamAnnotation::ModelAttribute { binding: false }) {
            container.set_binding_disabled(name.clone());
        }

        let model = container.model();
        if let Some(value) = model.get(&name) {
            return Ok(value);
        }

        let value = parameter
            .create_default()
            .ok_or_else(|| anyhow!("model attribute '{name}' cannot be created"))?;
        trace!(attribute = %name, "Created model attribute");
        model.add_attribute(name, value.clone());
        Ok(value)
    }
}

/// Resolves [`SessionAttribute`](super::SessionAttribute) arguments directly
/// from the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAttributeResolver;

impl ArgumentResolver for SessionAttributeResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.annotation() == ParamAnnotation::SessionAttribute
    }

    fn resolve_argument(
        &self,
        parameter: &MethodParameter,
        _container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        let name = parameter.attribute_name();
        request
            .session()
            .and_then(|session| session.get_attribute(&name))
            .ok_or_else(|| anyhow!("missing session attribute '{name}'"))
    }
}

/// Resolves the [`SessionStatus`](crate::model::SessionStatus) handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStatusResolver;

impl ArgumentResolver for SessionStatusResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.annotation() == ParamAnnotation::SessionStatus
    }

    fn resolve_argument(
        &self,
        _parameter: &MethodParameter,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        Ok(AttrValue::object(container.session_status().clone()))
    }
}

/// Resolves the live [`ModelMap`](crate::model::ModelMap).
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelResolver;

impl ArgumentResolver for ModelResolver {
    fn supports_parameter(&self, parameter: &MethodParameter) -> bool {
        parameter.annotation() == ParamAnnotation::Model
    }

    fn resolve_argument(
        &self,
        _parameter: &MethodParameter,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<AttrValue> {
        Ok(AttrValue::object(container.model()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use sluice_core::{Session, attributes};

    use super::*;
    use crate::handler::parameter::{FromArgument, ModelAttribute, PathVariable, RequestParam};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Cart {
        items: Vec<String>,
    }

    fn request_with_vars(vars: &[(&str, &str)]) -> WebRequest {
        let request = WebRequest::builder("/books/7").param("page", "3").build();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        request.set_attribute(attributes::URI_TEMPLATE_VARIABLES, AttrValue::map(vars));
        request
    }

    #[test]
    fn test_path_variable_by_name_and_single() {
        let mut container = ModelAndViewContainer::new();
        let request = request_with_vars(&[("id", "7")]);
        let resolver = PathVariableResolver;

        let unnamed = <PathVariable<u32> as FromArgument>::parameter(0);
        let value = resolver.resolve_argument(&unnamed, &mut container, &request).unwrap();
        assert_eq!(value.downcast::<u32>(), Some(7));

        let mut named = <PathVariable<u32> as FromArgument>::parameter(0);
        named.set_name("missing");
        assert!(resolver.resolve_argument(&named, &mut container, &request).is_err());
    }

    #[test]
    fn test_request_param_with_default() {
        let mut container = ModelAndViewContainer::new();
        let request = request_with_vars(&[]);
        let resolver = RequestParamResolver;

        let mut page = <RequestParam<u32> as FromArgument>::parameter(0);
        page.set_name("page");
        let value = resolver.resolve_argument(&page, &mut container, &request).unwrap();
        assert_eq!(value.downcast::<u32>(), Some(3));

        let mut size = <RequestParam<u32> as FromArgument>::parameter(1);
        size.set_name("size");
        assert!(resolver.resolve_argument(&size, &mut container, &request).is_err());
        size.set_default_value("20");
        let value = resolver.resolve_argument(&size, &mut container, &request).unwrap();
        assert_eq!(value.downcast::<u32>(), Some(20));
    }

    #[test]
    fn test_model_attribute_created_once() {
        let mut container = ModelAndViewContainer::new();
        let request = WebRequest::new("/cart");
        let parameter = <ModelAttribute<Cart> as FromArgument>::parameter(0);

        let first = ModelAttributeResolver
            .resolve_argument(&parameter, &mut container, &request)
            .unwrap();
        let second = ModelAttributeResolver
            .resolve_argument(&parameter, &mut container, &request)
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert!(container.contains_attribute("cart"));
    }

    #[test]
    fn test_composite_order() {
        let composite = ArgumentResolverComposite::with_defaults();
        assert_eq!(composite.len(), 6);

        let parameter = <ModelAttribute<Cart> as FromArgument>::parameter(0);
        assert!(composite.supports_parameter(&parameter));
        assert!(
            !composite.supports_parameter(&MethodParameter::new::<Cart>(0, ParamAnnotation::None))
        );
    }

    #[test]
    fn test_session_attribute_from_session() {
        let session = Session::new();
        session.set_attribute("user", AttrValue::from("ada"));
        let request = WebRequest::builder("/").session(session).build();
        let mut container = ModelAndViewContainer::new();

        let mut parameter = MethodParameter::new::<String>(0, ParamAnnotation::SessionAttribute);
        parameter.set_name("user");
        let value = SessionAttributeResolver
            .resolve_argument(&parameter, &mut container, &request)
            .unwrap();
        assert_eq!(value.downcast::<String>().as_deref(), Some("ada"));
    }
}
