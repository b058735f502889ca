//! # Sluice
//!
//! A request dispatch pipeline in the style of annotation-driven web
//! frameworks: URL patterns map to handler methods, handler arguments are
//! resolved from the request, the model and session, and the logical view a
//! handler names is resolved by content negotiation.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌───────────────────┐    ┌────────────────┐    ┌─────────────────────┐
//! │ WebRequest │───▶│ UrlHandlerMapping │───▶│ HandlerAdapter │───▶│ ContentNegotiating  │──▶ RenderedView
//! └────────────┘    │ (pattern registry)│    │ model, session │    │ ViewResolver        │
//!                   └───────────────────┘    │ async results  │    └─────────────────────┘
//!                                            └────────────────┘
//! ```
//!
//! - **Mapping**: exact paths, Ant-style patterns and `{var}` templates, ranked by specificity
//! - **Adapter**: runs model methods, resolves typed arguments, handles return values
//! - **Session attributes**: model entries kept across requests until the handler completes
//! - **Deferred results**: a [`Callable`](prelude::Callable) runs on a spawned task with interceptor hooks
//! - **Negotiation**: picks the view whose content type suits the `Accept` header or format parameter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use sluice::prelude::*;
//!
//! #[derive(Default)]
//! struct Books;
//!
//! impl Books {
//!     fn show(&self, id: PathVariable<u64>) -> ModelAndView {
//!         ModelAndView::with_view_name("books/show").attribute("id", *id)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     init_logging(&config.logging);
//!
//!     let dispatcher = DispatcherBuilder::from_config(&config)?
//!         .view("books/show", FnView::new(MediaType::text_html(), |model, _| {
//!             Ok(format!("<h1>{:?}</h1>", model.get_as::<u64>("id")))
//!         }).boxed())
//!         .build();
//!     dispatcher.register_controller(
//!         Controller::new(Arc::new(Books)).route("/books/{id}", "show", Books::show),
//!     )?;
//!
//!     let outcome = dispatcher.dispatch(Arc::new(WebRequest::new("/books/7"))).await?;
//!     println!("{}", outcome.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `sluice.toml` (default)
//! - `yaml-config`: load `sluice.yaml`
//! - `json-log`: JSON log output

pub use sluice_core as core;
pub use sluice_framework as framework;
pub use sluice_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use sluice::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use sluice_runtime::config::{ConfigLoader, SluiceConfig, load_config};
    pub use sluice_runtime::logging::init_from_config as init_logging;
    pub use sluice_runtime::{DispatchOutcome, Dispatcher, DispatcherBuilder, RuntimeError};

    // Requests and values
    pub use sluice_core::{AttrValue, MediaType, Session, WebRequest};

    // Controllers, arguments, models and views
    pub use sluice_framework::prelude::*;
    pub use sluice_framework::deferred::{CallableInfo, CallableInterceptor, InterceptorOutcome};
    pub use sluice_framework::negotiation::{MappedViewResolver, RenderedView, ViewResolver};
}
