//! Request dispatch.
//!
//! The [`Dispatcher`] wires the pipeline stages together: it resolves a
//! handler through the [`UrlHandlerMapping`], runs it with the
//! [`HandlerAdapter`], then resolves and renders the view the handler
//! selected. Dispatchers are cheap to clone and implement
//! [`tower::Service`], so they compose with tower middleware.
//!
//! ```rust,ignore
//! let config = load_config()?;
//! let dispatcher = DispatcherBuilder::from_config(&config)?
//!     .view("books/list", books_html)
//!     .build();
//! dispatcher.register_controller(books)?;
//!
//! let outcome = dispatcher.dispatch(Arc::new(WebRequest::new("/books"))).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use sluice_core::{AttrValue, DefaultSessionAttributeStore, SessionAttributeStore, WebRequest, attributes};
use sluice_framework::deferred::{AsyncTaskManager, CallableInterceptor};
use sluice_framework::mapping::{HandlerMatch, Resolution, UrlHandlerMapping};
use sluice_framework::model::ViewReference;
use sluice_framework::negotiation::{
    BoxedView, ContentNegotiatingViewResolver, ContentNegotiationManager,
    ContentNegotiationStrategy, HeaderStrategy, MappedViewResolver, MediaTypeMappings,
    ParameterStrategy, RenderedView, ViewResolver, sort_resolvers,
};
use sluice_framework::{Controller, HandlerAdapter, HandlerMethod, ModelAndView, NegotiationError};
use tower::Service;
use tracing::{Instrument, debug, info_span, trace, warn};

use crate::config::{ConfigResult, NegotiationConfig, SluiceConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Status of a request no handler matched.
pub const STATUS_NOT_FOUND: u16 = 404;

/// What dispatching a request produced.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A view was rendered.
    Rendered { status: u16, view: RenderedView },
    /// The handler returned a response body.
    Body { status: u16, value: AttrValue },
    /// The handler or an async interceptor completed the response itself.
    Handled { status: u16 },
    /// No handler matched the path.
    NotFound,
}

impl DispatchOutcome {
    /// Returns the response status.
    pub fn status(&self) -> u16 {
        match self {
            Self::Rendered { status, .. } | Self::Body { status, .. } | Self::Handled { status } => {
                *status
            }
            Self::NotFound => STATUS_NOT_FOUND,
        }
    }

    /// Returns the rendered view, if any.
    pub fn rendered(&self) -> Option<&RenderedView> {
        match self {
            Self::Rendered { view, .. } => Some(view),
            _ => None,
        }
    }
}

// =============================================================================
// DispatcherBuilder
// =============================================================================

/// Builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    mapping: UrlHandlerMapping<HandlerMethod>,
    negotiation: ContentNegotiationManager,
    use_not_acceptable_status: bool,
    views: MappedViewResolver,
    view_resolvers: Vec<Arc<dyn ViewResolver>>,
    default_views: Vec<BoxedView>,
    async_manager: AsyncTaskManager,
    session_store: Arc<dyn SessionAttributeStore>,
    ignore_default_model_on_redirect: bool,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    /// Creates a builder negotiating by the `Accept` header only.
    pub fn new() -> Self {
        Self {
            mapping: UrlHandlerMapping::new(),
            negotiation: ContentNegotiationManager::new(vec![Arc::new(HeaderStrategy)])
                .with_mappings(MediaTypeMappings::common()),
            use_not_acceptable_status: false,
            views: MappedViewResolver::new(),
            view_resolvers: Vec::new(),
            default_views: Vec::new(),
            async_manager: AsyncTaskManager::new(),
            session_store: Arc::new(DefaultSessionAttributeStore::new()),
            ignore_default_model_on_redirect: false,
        }
    }

    /// Creates a builder from configuration.
    pub fn from_config(config: &SluiceConfig) -> ConfigResult<Self> {
        let mapping = UrlHandlerMapping::new()
            .use_trailing_slash_match(config.mapping.use_trailing_slash_match)
            .lazy_init_handlers(config.mapping.lazy_init_handlers);

        let mut async_manager = AsyncTaskManager::new();
        if let Some(timeout) = config.async_processing.timeout() {
            async_manager = async_manager.with_default_timeout(timeout);
        }

        Ok(Self {
            mapping,
            negotiation: negotiation_manager(&config.negotiation)?,
            use_not_acceptable_status: config.negotiation.use_not_acceptable_status,
            async_manager,
            session_store: Arc::new(DefaultSessionAttributeStore::with_prefix(
                config.session.attribute_prefix.clone(),
            )),
            ..Self::new()
        })
    }

    /// Replaces the handler mapping.
    pub fn mapping(mut self, mapping: UrlHandlerMapping<HandlerMethod>) -> Self {
        self.mapping = mapping;
        self
    }

    /// Replaces the content negotiation manager.
    pub fn negotiation_manager(mut self, manager: ContentNegotiationManager) -> Self {
        self.negotiation = manager;
        self
    }

    /// Selects a 406 response when no view suits the requested media types.
    pub fn use_not_acceptable_status(mut self, enabled: bool) -> Self {
        self.use_not_acceptable_status = enabled;
        self
    }

    /// Registers a view under a logical name.
    pub fn view(self, name: impl Into<String>, view: BoxedView) -> Self {
        self.views.add_view(name, view);
        self
    }

    /// Adds a view resolver consulted during negotiation.
    pub fn view_resolver(mut self, resolver: Arc<dyn ViewResolver>) -> Self {
        self.view_resolvers.push(resolver);
        self
    }

    /// Adds a view offered for every view name, after the resolved ones.
    pub fn default_view(mut self, view: BoxedView) -> Self {
        self.default_views.push(view);
        self
    }

    /// Adds an interceptor applied to every deferred result.
    pub fn callable_interceptor(mut self, interceptor: Arc<dyn CallableInterceptor>) -> Self {
        self.async_manager = self.async_manager.with_interceptor(interceptor);
        self
    }

    /// Replaces the store holding session attributes.
    pub fn session_store(mut self, store: Arc<dyn SessionAttributeStore>) -> Self {
        self.session_store = store;
        self
    }

    /// Drops the default model when a handler redirects.
    pub fn ignore_default_model_on_redirect(mut self, ignore: bool) -> Self {
        self.ignore_default_model_on_redirect = ignore;
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> Dispatcher {
        let mut delegates: Vec<Arc<dyn ViewResolver>> = vec![Arc::new(self.views)];
        delegates.extend(self.view_resolvers);
        sort_resolvers(&mut delegates);

        let negotiating = delegates.iter().cloned().fold(
            ContentNegotiatingViewResolver::new(self.negotiation)
                .use_not_acceptable_status(self.use_not_acceptable_status),
            |resolver, delegate| resolver.with_view_resolver(delegate),
        );
        let negotiating = self
            .default_views
            .into_iter()
            .fold(negotiating, |resolver, view| resolver.with_default_view(view));

        let mut view_resolvers: Vec<Arc<dyn ViewResolver>> = vec![Arc::new(negotiating)];
        view_resolvers.extend(delegates);
        sort_resolvers(&mut view_resolvers);

        let adapter = HandlerAdapter::new()
            .with_session_store(self.session_store)
            .with_async_manager(self.async_manager)
            .ignore_default_model_on_redirect(self.ignore_default_model_on_redirect);

        Dispatcher {
            inner: Arc::new(DispatcherInner {
                mapping: self.mapping,
                adapter,
                view_resolvers,
            }),
        }
    }
}

/// Builds the negotiation manager: the format parameter first when favored,
/// then the `Accept` header unless ignored.
fn negotiation_manager(config: &NegotiationConfig) -> ConfigResult<ContentNegotiationManager> {
    let mut mappings = MediaTypeMappings::new();
    for (extension, media_type) in config.media_type_mappings()? {
        mappings.add(extension, media_type);
    }

    let mut strategies: Vec<Arc<dyn ContentNegotiationStrategy>> = Vec::new();
    if config.favor_parameter {
        strategies.push(Arc::new(
            ParameterStrategy::new(mappings.clone()).with_parameter_name(&config.parameter_name),
        ));
    }
    if !config.ignore_accept_header {
        strategies.push(Arc::new(HeaderStrategy));
    }

    Ok(ContentNegotiationManager::new(strategies).with_mappings(mappings))
}

// =============================================================================
// Dispatcher
// =============================================================================

struct DispatcherInner {
    mapping: UrlHandlerMapping<HandlerMethod>,
    adapter: HandlerAdapter,
    view_resolvers: Vec<Arc<dyn ViewResolver>>,
}

/// Routes requests to handler methods and renders their views.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Starts building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Registers a controller and maps its routes.
    pub fn register_controller<B: Send + Sync + 'static>(
        &self,
        controller: Controller<B>,
    ) -> RuntimeResult<()> {
        self.inner.mapping.register_routes(
            controller
                .routes()
                .iter()
                .map(|(pattern, method)| (pattern.as_str(), method.clone())),
        )?;
        self.inner.adapter.register_controller(&controller);
        Ok(())
    }

    /// Returns the handler mapping.
    pub fn mapping(&self) -> &UrlHandlerMapping<HandlerMethod> {
        &self.inner.mapping
    }

    /// Returns the handler adapter.
    pub fn adapter(&self) -> &HandlerAdapter {
        &self.inner.adapter
    }

    /// Dispatches `request` through the pipeline.
    pub async fn dispatch(&self, request: Arc<WebRequest>) -> RuntimeResult<DispatchOutcome> {
        let span = info_span!("dispatch", path = %request.path());
        self.dispatch_inner(request).instrument(span).await
    }

    async fn dispatch_inner(&self, request: Arc<WebRequest>) -> RuntimeResult<DispatchOutcome> {
        let HandlerMatch { handler, .. } = match self.inner.mapping.resolve(&request)? {
            Resolution::Found(found) => found,
            Resolution::NotFound => {
                debug!("No handler found");
                request.set_status(STATUS_NOT_FOUND);
                return Ok(DispatchOutcome::NotFound);
            }
        };

        if !handler.produced_media_types().is_empty() {
            request.set_producible_media_types(handler.produced_media_types().to_vec());
        }

        let Some(mav) = self.inner.adapter.handle(request.clone(), handler).await? else {
            let status = request.status();
            return Ok(match request.attribute(attributes::RESPONSE_BODY) {
                Some(value) => DispatchOutcome::Body { status, value },
                None => DispatchOutcome::Handled { status },
            });
        };

        if let Some(status) = mav.response_status() {
            request.set_status(status);
        }
        self.render(mav, &request)
    }

    fn render(&self, mav: ModelAndView, request: &WebRequest) -> RuntimeResult<DispatchOutcome> {
        let view = match mav.view() {
            Some(ViewReference::View(view)) => view.clone(),
            Some(ViewReference::Name(name)) => self.resolve_view(name, request)?,
            None => {
                let name = default_view_name(request.path());
                trace!(view = %name, "No view selected, using default view name");
                self.resolve_view(&name, request)?
            }
        };

        let rendered = view
            .render(&mav.model_map(), request)
            .map_err(|source| RuntimeError::Render {
                view: format!("{view:?}"),
                source,
            })?;
        Ok(DispatchOutcome::Rendered {
            status: request.status(),
            view: rendered,
        })
    }

    fn resolve_view(&self, view_name: &str, request: &WebRequest) -> RuntimeResult<BoxedView> {
        for resolver in &self.inner.view_resolvers {
            match resolver.resolve_view_name(view_name, request) {
                Ok(Some(view)) => return Ok(view),
                Ok(None) => continue,
                Err(e) => {
                    return Err(match e.downcast::<NegotiationError>() {
                        Ok(negotiation) => negotiation.into(),
                        Err(source) => RuntimeError::ViewResolution {
                            view_name: view_name.to_string(),
                            source,
                        },
                    });
                }
            }
        }
        warn!(view = %view_name, "Could not resolve view");
        Err(RuntimeError::ViewNotResolved {
            view_name: view_name.to_string(),
        })
    }
}

/// Derives a view name from the lookup path: `/books/list.html` becomes
/// `books/list`.
pub fn default_view_name(path: &str) -> String {
    let path = path.trim_matches('/');
    let stem_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[stem_start..].rfind('.') {
        Some(dot) => path[..stem_start + dot].to_string(),
        None => path.to_string(),
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mapping", &self.inner.mapping)
            .field("adapter", &self.inner.adapter)
            .field("view_resolvers", &self.inner.view_resolvers.len())
            .finish()
    }
}

impl Service<Arc<WebRequest>> for Dispatcher {
    type Response = DispatchOutcome;
    type Error = RuntimeError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Arc<WebRequest>) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.dispatch(request).await })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use sluice_core::MediaType;
    use sluice_framework::handler::{PathVariable, ResponseBody};
    use sluice_framework::negotiation::FnView;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Default)]
    struct Books;

    impl Books {
        fn list(&self) -> &'static str {
            "books/list"
        }

        fn show(&self, id: PathVariable<u32>) -> ModelAndView {
            ModelAndView::with_view_name("books/show").attribute("id", *id)
        }

        fn count(&self) -> ResponseBody<usize> {
            ResponseBody(3)
        }

        fn implicit(&self) {}

        fn save(&self) -> &'static str {
            "redirect:/books"
        }
    }

    fn dispatcher(config: &SluiceConfig) -> Dispatcher {
        let html = FnView::new(MediaType::text_html(), |_, _| Ok("<ul></ul>".to_string()));
        let json = FnView::new(MediaType::application_json(), |_, _| Ok("[]".to_string()));
        let show = FnView::new(MediaType::text_html(), |model, _| {
            Ok(format!("book {}", model.get_as::<u32>("id").unwrap_or_default()))
        });

        let dispatcher = DispatcherBuilder::from_config(config)
            .unwrap()
            .view("books/list", html.boxed())
            .view("books/list.json", json.boxed())
            .view("books/show", show.boxed())
            .view("books/archive", FnView::untyped("archive", |_, _| Ok("old".into())).boxed())
            .build();

        dispatcher
            .register_controller(
                Controller::new(Arc::new(Books))
                    .route("/books", "list", Books::list)
                    .route("/books/{id}", "show", Books::show)
                    .route("/books/count", "count", Books::count)
                    .route("/books/archive.html", "implicit", Books::implicit)
                    .route("/books/save", "save", Books::save),
            )
            .unwrap();
        dispatcher
    }

    fn get(path: &str, accept: &str) -> Arc<WebRequest> {
        Arc::new(WebRequest::builder(path).accept(accept).build())
    }

    #[tokio::test]
    async fn test_negotiates_by_accept_header() {
        let dispatcher = dispatcher(&SluiceConfig::default());

        let outcome = dispatcher.dispatch(get("/books", "application/json")).await.unwrap();
        assert_eq!(outcome.status(), 200);
        assert_eq!(outcome.rendered().unwrap().body, "[]");

        let outcome = dispatcher.dispatch(get("/books", "text/html")).await.unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "<ul></ul>");
    }

    #[derive(Debug)]
    struct Authors;

    impl Authors {
        fn list(&self) -> &'static str {
            "books/list"
        }
    }

    #[tokio::test]
    async fn test_conflicting_controller_maps_nothing() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let err = dispatcher
            .register_controller(
                Controller::new(Arc::new(Authors))
                    .route("/authors", "list", Authors::list)
                    .route("/books", "list", Authors::list),
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Mapping(_)));

        let outcome = dispatcher.dispatch(get("/authors", "text/html")).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NotFound));

        dispatcher
            .register_controller(Controller::new(Arc::new(Authors)).route("/authors", "list", Authors::list))
            .unwrap();
        let outcome = dispatcher.dispatch(get("/authors", "text/html")).await.unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "<ul></ul>");
    }

    #[tokio::test]
    async fn test_model_reaches_the_view() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let outcome = dispatcher.dispatch(get("/books/7", "text/html")).await.unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "book 7");
    }

    #[tokio::test]
    async fn test_not_found() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let request = get("/authors", "text/html");
        let outcome = dispatcher.dispatch(request.clone()).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NotFound));
        assert_eq!(request.status(), STATUS_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_response_body() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let outcome = dispatcher.dispatch(get("/books/count", "*/*")).await.unwrap();
        let DispatchOutcome::Body { status, value } = outcome else {
            panic!("expected a body");
        };
        assert_eq!(status, 200);
        assert_eq!(value.downcast::<usize>(), Some(3));
    }

    #[tokio::test]
    async fn test_redirect() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let outcome = dispatcher.dispatch(get("/books/save", "text/html")).await.unwrap();
        assert_eq!(outcome.status(), 302);
        assert_eq!(outcome.rendered().unwrap().header("location"), Some("/books"));
    }

    #[tokio::test]
    async fn test_default_view_name_from_path() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let outcome = dispatcher
            .dispatch(get("/books/archive.html", "text/html"))
            .await
            .unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "old");
    }

    #[tokio::test]
    async fn test_not_acceptable() {
        let mut config = SluiceConfig::default();
        config.negotiation.use_not_acceptable_status = true;
        let dispatcher = dispatcher(&config);

        let outcome = dispatcher.dispatch(get("/books", "image/png")).await.unwrap();
        assert_eq!(outcome.status(), 406);
    }

    #[tokio::test]
    async fn test_unknown_view_name() {
        let dispatcher = DispatcherBuilder::new().build();
        dispatcher
            .register_controller(Controller::new(Arc::new(Books)).route("/books", "list", Books::list))
            .unwrap();

        let err = dispatcher.dispatch(get("/books", "text/html")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ViewNotResolved { ref view_name } if view_name == "books/list"));
    }

    #[tokio::test]
    async fn test_format_parameter() {
        let mut config = SluiceConfig::default();
        config.negotiation.favor_parameter = true;
        let dispatcher = dispatcher(&config);

        let request = Arc::new(
            WebRequest::builder("/books")
                .accept("text/html")
                .param("format", "json")
                .build(),
        );
        let outcome = dispatcher.dispatch(request).await.unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "[]");
    }

    #[tokio::test]
    async fn test_as_tower_service() {
        let dispatcher = dispatcher(&SluiceConfig::default());
        let outcome = dispatcher
            .oneshot(get("/books", "application/json"))
            .await
            .unwrap();
        assert_eq!(outcome.rendered().unwrap().body, "[]");
    }

    #[test]
    fn test_default_view_name() {
        assert_eq!(default_view_name("/books/list.html"), "books/list");
        assert_eq!(default_view_name("/books/"), "books");
        assert_eq!(default_view_name("/v1.2/books"), "v1.2/books");
        assert_eq!(default_view_name("/"), "");
    }
}
