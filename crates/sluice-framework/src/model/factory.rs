//! Model initialization before, and update after, handler invocation.

use std::collections::HashSet;
use std::sync::Arc;

use sluice_core::{AttrValue, ValueKind, WebRequest};
use tracing::{debug, trace};

use super::binding::{BINDING_RESULT_PREFIX, BindingResultFactory, binding_result_key};
use super::container::ModelAndViewContainer;
use super::session::SessionAttributesHandler;
use crate::error::{ModelError, ModelResult};
use crate::handler::{HandlerMethod, InvocableHandlerMethod, ModelAttributeHandler};

/// A model-contributing method and the model attributes it depends on.
#[derive(Debug, Clone)]
pub struct ModelMethod {
    method: InvocableHandlerMethod,
    dependencies: HashSet<String>,
}

impl ModelMethod {
    /// Wraps `method`; its model attribute parameters become dependencies.
    pub fn new(method: InvocableHandlerMethod) -> Self {
        let dependencies = method
            .method()
            .parameters()
            .iter()
            .filter(|param| param.is_model_attribute())
            .map(|param| param.attribute_name())
            .collect();
        Self {
            method,
            dependencies,
        }
    }

    /// Returns the wrapped method.
    pub fn method(&self) -> &InvocableHandlerMethod {
        &self.method
    }

    /// Returns the names of the attributes this method needs.
    pub fn dependencies(&self) -> &HashSet<String> {
        &self.dependencies
    }

    /// Returns `true` if every dependency is present in the model.
    pub fn check_dependencies(&self, container: &mut ModelAndViewContainer) -> bool {
        let model = container.model();
        self.dependencies.iter().all(|name| model.contains(name))
    }
}

/// Populates the model before a handler runs and persists it afterwards.
pub struct ModelFactory {
    model_methods: Vec<ModelMethod>,
    session_handler: Arc<SessionAttributesHandler>,
    binding_factory: Arc<dyn BindingResultFactory>,
}

impl ModelFactory {
    /// Creates a factory.
    pub fn new(
        model_methods: Vec<ModelMethod>,
        session_handler: Arc<SessionAttributesHandler>,
        binding_factory: Arc<dyn BindingResultFactory>,
    ) -> Self {
        Self {
            model_methods,
            session_handler,
            binding_factory,
        }
    }

    /// Populates the model for `handler`.
    ///
    /// Earlier stages win: known session attributes first, then the results
    /// of model methods, then required session attributes fetched directly.
    pub fn init_model(
        &self,
        request: &WebRequest,
        container: &mut ModelAndViewContainer,
        handler: &HandlerMethod,
    ) -> ModelResult<()> {
        let session_attributes = self.session_handler.retrieve_attributes(request);
        container.merge_attributes(session_attributes);

        self.invoke_model_attribute_methods(request, container)?;

        for name in self.find_session_attribute_arguments(handler) {
            if container.contains_attribute(&name) {
                continue;
            }
            let value = self
                .session_handler
                .retrieve_attribute(request, &name)
                .ok_or_else(|| ModelError::RequiredStateMissing {
                    name: name.clone(),
                    method: handler.short_description(),
                })?;
            container.add_attribute(name, value);
        }

        Ok(())
    }

    fn invoke_model_attribute_methods(
        &self,
        request: &WebRequest,
        container: &mut ModelAndViewContainer,
    ) -> ModelResult<()> {
        let mut remaining: Vec<&ModelMethod> = self.model_methods.iter().collect();

        while !remaining.is_empty() {
            let model_method = Self::next_model_method(&mut remaining, container);
            let invocable = model_method.method();
            let method = invocable.method();

            if let Some(name) = method.return_attribute_name()
                && container.contains_attribute(name)
            {
                if !method.is_binding() {
                    container.set_binding_disabled(name);
                }
                continue;
            }

            let value = invocable.invoke_for_request(request, container, &[])?;
            if method.is_void() || value.is_void() {
                if method.return_attribute_name().is_some() {
                    debug!(method = %method, "Ignoring model attribute name of a method returning nothing");
                }
                continue;
            }

            let kind = value.kind();
            let Some(value) = value.into_attribute() else {
                debug!(method = %method, kind, "Ignoring unsupported model method result");
                continue;
            };

            let name = ModelAttributeHandler::attribute_name(&value, method);
            if !method.is_binding() {
                container.set_binding_disabled(name.clone());
            }
            if !container.contains_attribute(&name) {
                container.add_attribute(name, value);
            }
        }

        Ok(())
    }

    fn next_model_method<'a>(
        remaining: &mut Vec<&'a ModelMethod>,
        container: &mut ModelAndViewContainer,
    ) -> &'a ModelMethod {
        let position = remaining
            .iter()
            .position(|model_method| model_method.check_dependencies(container));

        match position {
            Some(index) => remaining.remove(index),
            None => {
                let model_method = remaining.remove(0);
                trace!(
                    method = %model_method.method().method(),
                    dependencies = ?model_method.dependencies(),
                    "No model method has its dependencies satisfied, invoking the first"
                );
                model_method
            }
        }
    }

    fn find_session_attribute_arguments(&self, handler: &HandlerMethod) -> Vec<String> {
        handler
            .parameters()
            .iter()
            .filter(|param| param.is_model_attribute())
            .map(|param| (param.attribute_name(), param.type_id()))
            .filter(|(name, type_id)| self.session_handler.is_handler_session_attribute(name, *type_id))
            .map(|(name, _)| name)
            .collect()
    }

    /// Persists session attributes and attaches binding results.
    pub fn update_model(&self, request: &WebRequest, container: &mut ModelAndViewContainer) {
        let default_model = container.default_model();

        if container.session_status().is_complete() {
            self.session_handler.cleanup_attributes(request);
        } else {
            self.session_handler
                .store_attributes(request, &default_model.snapshot());
        }

        if !container.is_request_handled() && container.model().ptr_eq(&default_model) {
            for (name, value) in default_model.snapshot() {
                if !self.is_binding_candidate(&name, &value) {
                    continue;
                }
                let key = binding_result_key(&name);
                if !default_model.contains(&key) {
                    let result = self
                        .binding_factory
                        .create_binding_result(request, &value, &name);
                    default_model.add_attribute(key, result.into_value());
                }
            }
        }
    }

    /// Returns `true` if `value` needs a binding result companion.
    pub fn is_binding_candidate(&self, name: &str, value: &AttrValue) -> bool {
        if name.starts_with(BINDING_RESULT_PREFIX) || value.kind() == ValueKind::BindingResult {
            return false;
        }
        if self
            .session_handler
            .is_handler_session_attribute(name, value.type_id())
        {
            return true;
        }
        !value.kind().is_plain()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use sluice_core::{DefaultSessionAttributeStore, Session};

    use super::*;
    use crate::handler::{ArgumentResolverComposite, Attribute, ModelAttribute, SessionAttribute};
    use crate::model::{BindingResult, DefaultBindingResultFactory, SessionAttributes};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Order {
        id: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Customer {
        name: String,
    }

    #[derive(Debug, Default)]
    struct Shop {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Shop {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn customer(shop: &Shop) -> Attribute<Customer> {
        shop.record("customer");
        Attribute(Customer { name: "ada".into() })
    }

    fn order(shop: &Shop, customer: ModelAttribute<Customer>) -> Attribute<Order> {
        shop.record("order");
        Attribute(Order {
            id: customer.name.len() as u32,
        })
    }

    fn checkout(_: &Shop, _order: ModelAttribute<Order>) {}

    fn resolvers() -> Arc<ArgumentResolverComposite> {
        Arc::new(ArgumentResolverComposite::with_defaults())
    }

    fn factory(declaration: SessionAttributes, methods: Vec<HandlerMethod>) -> ModelFactory {
        let methods = methods
            .into_iter()
            .map(|m| ModelMethod::new(InvocableHandlerMethod::new(Arc::new(m), resolvers())))
            .collect();
        ModelFactory::new(
            methods,
            Arc::new(SessionAttributesHandler::new(
                &declaration,
                Arc::new(DefaultSessionAttributeStore::new()),
            )),
            Arc::new(DefaultBindingResultFactory),
        )
    }

    #[test]
    fn test_dependent_method_runs_after_dependency() {
        let shop = Arc::new(Shop::default());
        let factory = factory(
            SessionAttributes::new(),
            vec![
                HandlerMethod::new(shop.clone(), "order", order),
                HandlerMethod::new(shop.clone(), "customer", customer),
            ],
        );
        let handler = HandlerMethod::new(shop.clone(), "checkout", checkout);
        let mut container = ModelAndViewContainer::new();

        factory
            .init_model(&WebRequest::new("/checkout"), &mut container, &handler)
            .unwrap();

        assert_eq!(*shop.calls.lock().unwrap(), vec!["customer", "order"]);
        assert_eq!(container.model().get_as::<Order>("order"), Some(Order { id: 3 }));
    }

    #[test]
    fn test_unsatisfiable_dependencies_fall_back_to_first() {
        let shop = Arc::new(Shop::default());
        let factory = factory(
            SessionAttributes::new(),
            vec![HandlerMethod::new(shop.clone(), "order", order)],
        );
        let handler = HandlerMethod::new(shop.clone(), "checkout", checkout);
        let mut container = ModelAndViewContainer::new();

        factory
            .init_model(&WebRequest::new("/checkout"), &mut container, &handler)
            .unwrap();

        assert_eq!(*shop.calls.lock().unwrap(), vec!["order"]);
        assert!(container.contains_attribute("customer"));
    }

    #[test]
    fn test_earlier_stage_wins_and_explicit_name_skips() {
        let shop = Arc::new(Shop::default());
        let factory = factory(
            SessionAttributes::new(),
            vec![
                HandlerMethod::new(shop.clone(), "customer", customer)
                    .model_attribute_name("buyer")
                    .binding(false),
            ],
        );
        let handler = HandlerMethod::new(shop.clone(), "noop", |_: &Shop| {});
        let mut container = ModelAndViewContainer::new();
        container.add_attribute("buyer", AttrValue::from("existing"));

        factory
            .init_model(&WebRequest::new("/"), &mut container, &handler)
            .unwrap();

        assert!(shop.calls.lock().unwrap().is_empty());
        assert!(container.is_binding_disabled("buyer"));
        assert_eq!(container.model().get_as::<String>("buyer").as_deref(), Some("existing"));
    }

    #[test]
    fn test_required_session_attribute_missing() {
        let shop = Arc::new(Shop::default());
        let factory = factory(SessionAttributes::new().name("order"), vec![]);
        let handler = HandlerMethod::new(shop.clone(), "checkout", checkout);

        let err = factory
            .init_model(&WebRequest::new("/"), &mut ModelAndViewContainer::new(), &handler)
            .unwrap_err();
        assert!(matches!(err, ModelError::RequiredStateMissing { ref name, .. } if name == "order"));

        let session = Session::new();
        session.set_attribute("order", AttrValue::object(Order { id: 9 }));
        let request = WebRequest::builder("/").session(session).build();
        let mut container = ModelAndViewContainer::new();
        factory.init_model(&request, &mut container, &handler).unwrap();
        assert_eq!(container.model().get_as::<Order>("order"), Some(Order { id: 9 }));
    }

    #[test]
    fn test_update_model_stores_and_binds() {
        let shop = Arc::new(Shop::default());
        let factory = factory(SessionAttributes::new().of_type::<Order>(), vec![]);
        let request = WebRequest::new("/");
        let mut container = ModelAndViewContainer::new();
        container.add_attribute("order", AttrValue::object(Order { id: 1 }));
        container.add_attribute("customer", AttrValue::object(Customer::default()));
        container.add_attribute("count", AttrValue::from(3));
        container.add_attribute("tags", AttrValue::from(vec!["a".to_string()]));

        factory.update_model(&request, &mut container);

        let session = request.session().cloned().unwrap();
        assert!(session.get_attribute("order").is_some());
        assert!(session.get_attribute("customer").is_none());

        let model = container.model();
        assert!(model.contains(&binding_result_key("order")));
        assert!(model.contains(&binding_result_key("customer")));
        assert!(!model.contains(&binding_result_key("count")));
        assert!(!model.contains(&binding_result_key("tags")));
        let result = model
            .get(&binding_result_key("customer"))
            .and_then(|v| v.downcast::<BindingResult>())
            .unwrap();
        assert_eq!(result.object_name(), "customer");
    }

    #[test]
    fn test_update_model_cleans_up_when_complete() {
        let shop = Arc::new(Shop::default());
        let factory = factory(SessionAttributes::new().name("order"), vec![]);
        let session = Session::new();
        session.set_attribute("order", AttrValue::object(Order { id: 1 }));
        let request = WebRequest::builder("/").session(session.clone()).build();

        let mut container = ModelAndViewContainer::new();
        container.session_status().set_complete();
        container.set_request_handled(true);
        factory.update_model(&request, &mut container);

        assert!(session.get_attribute("order").is_none());
        assert!(container.model().is_empty());
    }

    #[test]
    fn test_session_attribute_argument_is_not_model_attribute() {
        fn show(_: &Shop, _user: SessionAttribute<String>) {}

        let shop = Arc::new(Shop::default());
        let factory = factory(SessionAttributes::new().name("user"), vec![]);
        let handler = HandlerMethod::new(shop.clone(), "show", show);
        assert!(factory.find_session_attribute_arguments(&handler).is_empty());
    }
}
