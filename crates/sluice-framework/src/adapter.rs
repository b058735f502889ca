//! Running handler methods against a request.
//!
//! The [`HandlerAdapter`] ties the pipeline stages together for one
//! handler method: it prepares the model, resolves arguments and invokes
//! the method, awaits deferred results, interprets the return value and
//! finally persists the model.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use sluice_core::{DefaultSessionAttributeStore, SessionAttributeStore, WebRequest};
use tracing::{debug, trace};

use crate::deferred::{AsyncTaskManager, ConcurrentResult, DeferredOutcome};
use crate::error::{HandlingResult, InvocationError};
use crate::handler::{
    ArgumentResolverComposite, Handler, HandlerMethod, InvocableHandlerMethod, ReturnValue,
    ReturnValueHandlerComposite,
};
use crate::model::{
    BindingResultFactory, DefaultBindingResultFactory, ModelAndView, ModelAndViewContainer,
    ModelFactory, ModelMethod, SessionAttributes, SessionAttributesHandler,
};

// =============================================================================
// Controller
// =============================================================================

/// A bean with its routes, model methods and session attribute declaration.
///
/// ```rust,ignore
/// let books = Controller::new(Arc::new(BookController::default()))
///     .session_attributes(SessionAttributes::new().name("cart"))
///     .model_method("categories", BookController::categories)
///     .route("/books", "list", BookController::list)
///     .route("/books/{id}", "show", BookController::show);
/// ```
pub struct Controller<B> {
    bean: Arc<B>,
    session_attributes: SessionAttributes,
    model_methods: Vec<Arc<HandlerMethod>>,
    routes: Vec<(String, Arc<HandlerMethod>)>,
}

impl<B: Send + Sync + 'static> Controller<B> {
    /// Creates a controller around `bean`.
    pub fn new(bean: Arc<B>) -> Self {
        Self {
            bean,
            session_attributes: SessionAttributes::new(),
            model_methods: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Declares the attributes kept in the session.
    pub fn session_attributes(mut self, declaration: SessionAttributes) -> Self {
        self.session_attributes = declaration;
        self
    }

    /// Binds `f` to this controller's bean without registering it.
    pub fn method<Args, F>(&self, method_name: impl Into<String>, f: F) -> HandlerMethod
    where
        Args: 'static,
        F: Handler<B, Args>,
    {
        HandlerMethod::new(self.bean.clone(), method_name, f)
    }

    /// Adds a model method run before every handler of this controller.
    pub fn model_method<Args, F>(self, method_name: impl Into<String>, f: F) -> Self
    where
        Args: 'static,
        F: Handler<B, Args>,
    {
        let method = self.method(method_name, f);
        self.model_method_with(method)
    }

    /// Adds a configured model method.
    pub fn model_method_with(mut self, method: HandlerMethod) -> Self {
        self.model_methods.push(Arc::new(method));
        self
    }

    /// Routes `pattern` to `f`.
    pub fn route<Args, F>(self, pattern: impl Into<String>, method_name: impl Into<String>, f: F) -> Self
    where
        Args: 'static,
        F: Handler<B, Args>,
    {
        let method = self.method(method_name, f);
        self.route_with(pattern, method)
    }

    /// Routes `pattern` to a configured handler method.
    pub fn route_with(mut self, pattern: impl Into<String>, method: HandlerMethod) -> Self {
        self.routes.push((pattern.into(), Arc::new(method)));
        self
    }

    /// Returns the bean.
    pub fn bean(&self) -> &Arc<B> {
        &self.bean
    }

    /// Returns the routes in declaration order.
    pub fn routes(&self) -> &[(String, Arc<HandlerMethod>)] {
        &self.routes
    }

    /// Returns the model methods in declaration order.
    pub fn model_methods(&self) -> &[Arc<HandlerMethod>] {
        &self.model_methods
    }
}

impl<B> fmt::Debug for Controller<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("bean", &std::any::type_name::<B>())
            .field("session_attributes", &self.session_attributes)
            .field("model_methods", &self.model_methods.len())
            .field("routes", &self.routes.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .finish()
    }
}

struct ControllerMetadata {
    session_attributes: SessionAttributes,
    model_methods: Vec<Arc<HandlerMethod>>,
}

// =============================================================================
// HandlerAdapter
// =============================================================================

/// Invokes handler methods and turns their results into a [`ModelAndView`].
pub struct HandlerAdapter {
    argument_resolvers: Arc<ArgumentResolverComposite>,
    return_value_handlers: ReturnValueHandlerComposite,
    session_store: Arc<dyn SessionAttributeStore>,
    binding_factory: Arc<dyn BindingResultFactory>,
    async_manager: AsyncTaskManager,
    ignore_default_model_on_redirect: bool,
    controllers: DashMap<TypeId, ControllerMetadata>,
    session_handlers: DashMap<TypeId, Arc<SessionAttributesHandler>>,
}

impl HandlerAdapter {
    /// Creates an adapter with the built-in resolvers and return value handlers.
    pub fn new() -> Self {
        Self {
            argument_resolvers: Arc::new(ArgumentResolverComposite::with_defaults()),
            return_value_handlers: ReturnValueHandlerComposite::with_defaults(),
            session_store: Arc::new(DefaultSessionAttributeStore::new()),
            binding_factory: Arc::new(DefaultBindingResultFactory),
            async_manager: AsyncTaskManager::new(),
            ignore_default_model_on_redirect: false,
            controllers: DashMap::new(),
            session_handlers: DashMap::new(),
        }
    }

    /// Replaces the argument resolvers.
    pub fn with_argument_resolvers(mut self, resolvers: ArgumentResolverComposite) -> Self {
        self.argument_resolvers = Arc::new(resolvers);
        self
    }

    /// Replaces the return value handlers.
    pub fn with_return_value_handlers(mut self, handlers: ReturnValueHandlerComposite) -> Self {
        self.return_value_handlers = handlers;
        self
    }

    /// Replaces the session attribute store.
    pub fn with_session_store(mut self, store: Arc<dyn SessionAttributeStore>) -> Self {
        self.session_store = store;
        self
    }

    /// Replaces the binding result factory.
    pub fn with_binding_result_factory(mut self, factory: Arc<dyn BindingResultFactory>) -> Self {
        self.binding_factory = factory;
        self
    }

    /// Replaces the async task manager.
    pub fn with_async_manager(mut self, manager: AsyncTaskManager) -> Self {
        self.async_manager = manager;
        self
    }

    /// Drops the default model when a handler redirects without setting a
    /// redirect model.
    pub fn ignore_default_model_on_redirect(mut self, ignore: bool) -> Self {
        self.ignore_default_model_on_redirect = ignore;
        self
    }

    /// Returns the async task manager.
    pub fn async_manager(&self) -> &AsyncTaskManager {
        &self.async_manager
    }

    /// Records the model methods and session attributes of `controller`.
    ///
    /// Routes are not registered here; hand them to a
    /// [`UrlHandlerMapping`](crate::mapping::UrlHandlerMapping).
    pub fn register_controller<B: Send + Sync + 'static>(&self, controller: &Controller<B>) {
        let bean_type = TypeId::of::<B>();
        self.session_handlers.remove(&bean_type);
        self.controllers.insert(
            bean_type,
            ControllerMetadata {
                session_attributes: controller.session_attributes.clone(),
                model_methods: controller.model_methods.clone(),
            },
        );
        debug!(
            controller = std::any::type_name::<B>(),
            model_methods = controller.model_methods.len(),
            routes = controller.routes.len(),
            "Registered controller"
        );
    }

    /// Returns the session attribute handler for the controller type of
    /// `handler`, creating it on first use.
    pub fn session_attributes_handler(&self, handler: &HandlerMethod) -> Arc<SessionAttributesHandler> {
        let bean_type = handler.declared_type();
        self.session_handlers
            .entry(bean_type)
            .or_insert_with(|| {
                let declaration = self
                    .controllers
                    .get(&bean_type)
                    .map(|meta| meta.session_attributes.clone())
                    .unwrap_or_default();
                Arc::new(SessionAttributesHandler::new(
                    &declaration,
                    self.session_store.clone(),
                ))
            })
            .clone()
    }

    fn model_factory(&self, handler: &HandlerMethod) -> ModelFactory {
        let model_methods = self
            .controllers
            .get(&handler.declared_type())
            .map(|meta| {
                meta.model_methods
                    .iter()
                    .map(|method| {
                        let bound = Arc::new(method.rebind(handler));
                        ModelMethod::new(InvocableHandlerMethod::new(
                            bound,
                            self.argument_resolvers.clone(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        ModelFactory::new(
            model_methods,
            self.session_attributes_handler(handler),
            self.binding_factory.clone(),
        )
    }

    /// Handles `request` with `handler`.
    ///
    /// Returns `None` if the request was handled completely, e.g. by a
    /// response body or an async interceptor.
    pub async fn handle(
        &self,
        request: Arc<WebRequest>,
        handler: Arc<HandlerMethod>,
    ) -> HandlingResult<Option<ModelAndView>> {
        let model_factory = self.model_factory(&handler);
        let invocable = InvocableHandlerMethod::new(handler.clone(), self.argument_resolvers.clone());

        let mut container = ModelAndViewContainer::new();
        container.set_ignore_default_model_on_redirect(self.ignore_default_model_on_redirect);
        model_factory.init_model(&request, &mut container, &handler)?;

        let mut value = invocable.invoke_for_request(&request, &mut container, &[])?;
        let value = loop {
            match value {
                ReturnValue::Async(callable) => {
                    trace!(method = %handler, "Handler returned a deferred result");
                    match self
                        .async_manager
                        .start_callable_processing(request.clone(), callable)
                        .await?
                    {
                        DeferredOutcome::ResponseHandled => {
                            debug!(method = %handler, "Response handled by async interceptor");
                            return Ok(None);
                        }
                        DeferredOutcome::Result(ConcurrentResult::Value(next)) => value = next,
                        DeferredOutcome::Result(ConcurrentResult::Error(e)) => {
                            return Err(InvocationError::Handler(e).into());
                        }
                    }
                }
                other => break other,
            }
        };

        self.return_value_handlers
            .handle_return_value(value, &handler, &mut container, &request)?;
        model_factory.update_model(&request, &mut container);

        if container.is_request_handled() {
            return Ok(None);
        }
        Ok(Some(container.to_model_and_view()))
    }
}

impl Default for HandlerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerAdapter")
            .field("controllers", &self.controllers.len())
            .field("async_manager", &self.async_manager)
            .field(
                "ignore_default_model_on_redirect",
                &self.ignore_default_model_on_redirect,
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;
    use sluice_core::{AttrValue, Session, attributes};

    use super::*;
    use crate::deferred::Callable;
    use crate::error::{AsyncError, HandlingError, ModelError};
    use crate::handler::{Attribute, ModelAttribute, PathVariable, ResponseBody, SessionAttribute};
    use crate::model::{ModelMap, SessionStatus, ViewReference};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Cart {
        items: Vec<String>,
    }

    #[derive(Debug, Default)]
    struct Shop;

    impl Shop {
        fn cart(&self) -> Attribute<Cart> {
            Attribute(Cart { items: Vec::new() })
        }

        fn add(
            &self,
            cart: ModelAttribute<Cart>,
            item: PathVariable<String>,
            model: ModelMap,
        ) -> &'static str {
            let mut cart = cart.into_inner();
            cart.items.push(item.into_inner());
            model.add_attribute("cart", AttrValue::object(cart));
            "cart/show"
        }

        fn checkout(&self, cart: SessionAttribute<Cart>, status: SessionStatus) -> String {
            status.set_complete();
            format!("redirect:/orders?items={}", cart.items.len())
        }

        fn count(&self, cart: ModelAttribute<Cart>) -> ResponseBody<usize> {
            ResponseBody(cart.items.len())
        }

        fn slow(&self) -> Callable {
            Callable::new(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "never"
            })
        }

        fn deferred(&self) -> Callable {
            Callable::new(async { Ok::<_, anyhow::Error>("cart/deferred") })
        }

        fn failing(&self) -> Callable {
            Callable::new(async { Err::<String, _>(anyhow!("out of stock")) })
        }
    }

    #[derive(Debug, Default)]
    struct Checkout;

    impl Checkout {
        fn confirm(&self, cart: ModelAttribute<Cart>) -> String {
            format!("orders/confirm/{}", cart.items.len())
        }
    }

    fn setup() -> (HandlerAdapter, Controller<Shop>) {
        let controller = Controller::new(Arc::new(Shop))
            .session_attributes(SessionAttributes::new().name("cart"))
            .model_method("cart", Shop::cart)
            .route("/cart/add/{item}", "add", Shop::add)
            .route("/cart/checkout", "checkout", Shop::checkout)
            .route("/cart/count", "count", Shop::count)
            .route("/slow", "slow", Shop::slow)
            .route("/deferred", "deferred", Shop::deferred)
            .route("/failing", "failing", Shop::failing);
        let adapter = HandlerAdapter::new();
        adapter.register_controller(&controller);
        (adapter, controller)
    }

    fn route(controller: &Controller<Shop>, pattern: &str) -> Arc<HandlerMethod> {
        controller
            .routes()
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, m)| m.clone())
            .unwrap()
    }

    fn request(path: &str, session: &Session, vars: &[(&str, &str)]) -> Arc<WebRequest> {
        let request = WebRequest::builder(path).session(session.clone()).build();
        if !vars.is_empty() {
            let vars: std::collections::HashMap<String, String> = vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            request.set_attribute(attributes::URI_TEMPLATE_VARIABLES, AttrValue::map(vars));
        }
        Arc::new(request)
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (adapter, controller) = setup();
        let session = Session::new();

        let add = route(&controller, "/cart/add/{item}");
        for item in ["dune", "emma"] {
            let mav = adapter
                .handle(request("/cart/add/x", &session, &[("item", item)]), add.clone())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(mav.view(), Some(ViewReference::Name(name)) if name == "cart/show"));
        }
        let stored = session.get_attribute("cart").unwrap();
        assert_eq!(stored.downcast_ref::<Cart>().unwrap().items, vec!["dune", "emma"]);

        let checkout = route(&controller, "/cart/checkout");
        let mav = adapter
            .handle(request("/cart/checkout", &session, &[]), checkout)
            .await
            .unwrap()
            .unwrap();
        assert!(mav.view().unwrap().is_redirect());
        assert!(session.get_attribute("cart").is_none());
    }

    #[tokio::test]
    async fn test_missing_session_attribute() {
        let (adapter, _) = setup();
        let checkout = Controller::new(Arc::new(Checkout))
            .session_attributes(SessionAttributes::new().name("cart"))
            .route("/confirm", "confirm", Checkout::confirm);
        adapter.register_controller(&checkout);

        let err = adapter
            .handle(
                request("/confirm", &Session::new(), &[]),
                checkout.routes()[0].1.clone(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandlingError::Model(ModelError::RequiredStateMissing { ref name, .. }) if name == "cart"
        ));
    }

    #[tokio::test]
    async fn test_response_body_handles_request() {
        let (adapter, controller) = setup();
        let request = request("/cart/count", &Session::new(), &[]);
        let mav = adapter
            .handle(request.clone(), route(&controller, "/cart/count"))
            .await
            .unwrap();
        assert!(mav.is_none());
        let body = request.attribute(attributes::RESPONSE_BODY).unwrap();
        assert_eq!(body.downcast::<usize>(), Some(0));
    }

    #[tokio::test]
    async fn test_deferred_result_is_handled_like_a_direct_one() {
        let (adapter, controller) = setup();
        let mav = adapter
            .handle(
                request("/deferred", &Session::new(), &[]),
                route(&controller, "/deferred"),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(mav.view(), Some(ViewReference::Name(name)) if name == "cart/deferred"));
    }

    #[tokio::test]
    async fn test_deferred_failure_is_kept_verbatim() {
        let (adapter, controller) = setup();
        let err = adapter
            .handle(
                request("/failing", &Session::new(), &[]),
                route(&controller, "/failing"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.handler_error().unwrap().to_string(), "out of stock");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_timeout() {
        let (_, controller) = setup();
        let adapter = HandlerAdapter::new()
            .with_async_manager(AsyncTaskManager::new().with_default_timeout(Duration::from_millis(10)));
        adapter.register_controller(&controller);

        let err = adapter
            .handle(request("/slow", &Session::new(), &[]), route(&controller, "/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlingError::Async(AsyncError::Timeout { .. })));
    }
}
