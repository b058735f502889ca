//! Return value handlers.
//!
//! After a handler method runs, its [`ReturnValue`] is passed to the first
//! [`ReturnValueHandler`] that supports it. Handlers record their decision in
//! the [`ModelAndViewContainer`]: a view, model attributes, or the fact that
//! the response was written directly.

use std::sync::Arc;

use sluice_core::{AttrValue, WebRequest, attributes, conventions};
use tracing::trace;

use super::method::HandlerMethod;
use super::return_value::ReturnValue;
use crate::error::ReturnValueError;
use crate::model::{ModelAndViewContainer, REDIRECT_URL_PREFIX};

/// Handles the values returned by handler methods.
pub trait ReturnValueHandler: Send + Sync {
    /// Returns `true` if this handler supports `value`.
    fn supports_return_value(&self, value: &ReturnValue) -> bool;

    /// Handles `value`, recording the outcome in `container`.
    fn handle_return_value(
        &self,
        value: ReturnValue,
        method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<()>;
}

/// An ordered list of return value handlers.
#[derive(Clone, Default)]
pub struct ReturnValueHandlerComposite {
    handlers: Vec<Arc<dyn ReturnValueHandler>>,
}

impl ReturnValueHandlerComposite {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a composite holding the built-in handlers.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_handler(VoidHandler)
            .with_handler(ViewNameHandler)
            .with_handler(ViewHandler)
            .with_handler(ModelAndViewHandler)
            .with_handler(ModelAttributeHandler)
            .with_handler(ResponseBodyHandler)
    }

    /// Appends a handler.
    pub fn with_handler(mut self, handler: impl ReturnValueHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Appends a shared handler.
    pub fn add_handler(&mut self, handler: Arc<dyn ReturnValueHandler>) {
        self.handlers.push(handler);
    }

    /// Hands `value` to the first supporting handler.
    pub fn handle_return_value(
        &self,
        value: ReturnValue,
        method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> Result<(), ReturnValueError> {
        let kind = value.kind();
        let Some(handler) = self
            .handlers
            .iter()
            .find(|handler| handler.supports_return_value(&value))
        else {
            return Err(ReturnValueError::Unsupported {
                kind,
                method: method.short_description(),
            });
        };

        handler
            .handle_return_value(value, method, container, request)
            .map_err(|source| ReturnValueError::Failed {
                kind,
                method: method.short_description(),
                source,
            })
    }
}

// =============================================================================
// Built-in handlers
// =============================================================================

/// Leaves the view undecided.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoidHandler;

impl ReturnValueHandler for VoidHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        value.is_void()
    }

    fn handle_return_value(
        &self,
        _value: ReturnValue,
        _method: &HandlerMethod,
        _container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Records a view name; `redirect:` names switch to the redirect model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewNameHandler;

impl ReturnValueHandler for ViewNameHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::ViewName(_))
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<()> {
        if let ReturnValue::ViewName(name) = value {
            if name.starts_with(REDIRECT_URL_PREFIX) {
                container.set_redirect_model_scenario(true);
            }
            container.set_view_name(name);
        }
        Ok(())
    }
}

/// Records a view instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewHandler;

impl ReturnValueHandler for ViewHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::View(_))
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<()> {
        if let ReturnValue::View(view) = value {
            if view.is_redirect() {
                container.set_redirect_model_scenario(true);
            }
            container.set_view(view);
        }
        Ok(())
    }
}

/// Copies the view, model and status of a [`ModelAndView`](crate::model::ModelAndView).
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelAndViewHandler;

impl ReturnValueHandler for ModelAndViewHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::ModelAndView(_))
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<()> {
        let ReturnValue::ModelAndView(mav) = value else {
            return Ok(());
        };
        let (view, model, status) = mav.into_parts();

        if view.as_ref().is_some_and(|view| view.is_redirect()) {
            container.set_redirect_model_scenario(true);
        }
        container.set_view_reference(view);
        if let Some(status) = status {
            container.set_status(status);
        }
        container.add_all_attributes(model);
        Ok(())
    }
}

/// Adds the value to the model.
///
/// The attribute name is the method's explicit name, else derived from the
/// declared return type, else from the runtime value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelAttributeHandler;

impl ModelAttributeHandler {
    /// Returns the model attribute name for a value returned by `method`.
    pub fn attribute_name(value: &AttrValue, method: &HandlerMethod) -> String {
        if let Some(name) = method.return_attribute_name() {
            return name.to_string();
        }
        match method.return_type().type_name() {
            Some(type_name) => conventions::variable_name(type_name),
            None => value.conventional_name(),
        }
    }
}

impl ReturnValueHandler for ModelAttributeHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::Attribute(_))
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        _request: &WebRequest,
    ) -> anyhow::Result<()> {
        if let ReturnValue::Attribute(value) = value {
            let name = Self::attribute_name(&value, method);
            trace!(attribute = %name, "Adding returned model attribute");
            container.add_attribute(name, value);
        }
        Ok(())
    }
}

/// Exposes the value as the response body and marks the request handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseBodyHandler;

impl ReturnValueHandler for ResponseBodyHandler {
    fn supports_return_value(&self, value: &ReturnValue) -> bool {
        matches!(value, ReturnValue::Body(_))
    }

    fn handle_return_value(
        &self,
        value: ReturnValue,
        _method: &HandlerMethod,
        container: &mut ModelAndViewContainer,
        request: &WebRequest,
    ) -> anyhow::Result<()> {
        if let ReturnValue::Body(body) = value {
            container.set_request_handled(true);
            request.set_attribute(attributes::RESPONSE_BODY, body);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::return_value::{Attribute, ResponseBody};
    use crate::model::ModelAndView;

    #[derive(Debug, Clone, PartialEq)]
    struct Book {
        title: String,
    }

    #[derive(Debug)]
    struct Shelf;

    fn dune() -> Book {
        Book {
            title: "Dune".into(),
        }
    }

    fn handle(method: &HandlerMethod, value: ReturnValue) -> (ModelAndViewContainer, WebRequest) {
        let mut container = ModelAndViewContainer::new();
        let request = WebRequest::new("/books");
        ReturnValueHandlerComposite::with_defaults()
            .handle_return_value(value, method, &mut container, &request)
            .unwrap();
        (container, request)
    }

    #[test]
    fn test_redirect_view_name_switches_model() {
        let method = HandlerMethod::new(Arc::new(Shelf), "save", |_: &Shelf| "redirect:/books");
        let (container, _) = handle(&method, ReturnValue::ViewName("redirect:/books".into()));

        assert!(container.is_redirect_model_scenario());
        assert_eq!(container.view_name(), Some("redirect:/books"));
    }

    #[test]
    fn test_attribute_named_from_declared_type() {
        let method = HandlerMethod::new(Arc::new(Shelf), "book", |_: &Shelf| Attribute(dune()));
        let (mut container, _) = handle(&method, ReturnValue::Attribute(AttrValue::object(dune())));
        assert!(container.contains_attribute("book"));

        let named = method.model_attribute_name("favourite");
        let (mut container, _) = handle(&named, ReturnValue::Attribute(AttrValue::object(dune())));
        assert!(container.contains_attribute("favourite"));
    }

    #[test]
    fn test_attribute_named_from_runtime_value() {
        let method = HandlerMethod::new(Arc::new(Shelf), "any", |_: &Shelf| AttrValue::object(dune()));
        let (mut container, _) = handle(&method, ReturnValue::Attribute(AttrValue::object(dune())));
        assert!(container.contains_attribute("book"));
    }

    #[test]
    fn test_response_body_marks_handled() {
        let method = HandlerMethod::new(Arc::new(Shelf), "json", |_: &Shelf| ResponseBody(dune()));
        let (container, request) = handle(&method, ReturnValue::Body(AttrValue::object(dune())));

        assert!(container.is_request_handled());
        assert!(request.attribute(attributes::RESPONSE_BODY).is_some());
    }

    #[test]
    fn test_model_and_view_is_copied() {
        let method = HandlerMethod::new(Arc::new(Shelf), "page", |_: &Shelf| ModelAndView::new());
        let mav = ModelAndView::with_view_name("books/show")
            .attribute("book", AttrValue::object(dune()))
            .status(201);
        let (mut container, _) = handle(&method, ReturnValue::ModelAndView(mav));

        assert_eq!(container.view_name(), Some("books/show"));
        assert_eq!(container.status(), Some(201));
        assert!(container.contains_attribute("book"));
    }

    #[test]
    fn test_unsupported_value() {
        let method = HandlerMethod::new(Arc::new(Shelf), "noop", |_: &Shelf| {});
        let err = ReturnValueHandlerComposite::new()
            .handle_return_value(
                ReturnValue::Void,
                &method,
                &mut ModelAndViewContainer::new(),
                &WebRequest::new("/"),
            )
            .unwrap_err();
        assert!(matches!(err, ReturnValueError::Unsupported { kind: "void", .. }));
    }
}
