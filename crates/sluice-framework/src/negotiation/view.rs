//! Views and their rendered output.

use std::fmt;
use std::sync::Arc;

use sluice_core::{MediaType, WebRequest};

use crate::model::ModelMap;

/// Status set by [`RedirectView`].
pub const STATUS_FOUND: u16 = 302;

/// Status set by [`NotAcceptableView`].
pub const STATUS_NOT_ACCEPTABLE: u16 = 406;

/// The output of rendering a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedView {
    /// Content type of the body, if any.
    pub content_type: Option<MediaType>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl RenderedView {
    /// Creates an output with a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: MediaType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first header value with `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A renderable representation of a model.
///
/// Content negotiation reads [`content_type`](Self::content_type) and
/// [`is_redirect`](Self::is_redirect); views that declare neither are only
/// chosen as a last resort by outer resolvers.
pub trait View: Send + Sync + fmt::Debug {
    /// The content type this view produces, if known.
    fn content_type(&self) -> Option<MediaType> {
        None
    }

    /// Returns `true` if this view redirects instead of rendering content.
    fn is_redirect(&self) -> bool {
        false
    }

    /// Renders the model.
    fn render(&self, model: &ModelMap, request: &WebRequest) -> anyhow::Result<RenderedView>;
}

/// A shared, type-erased view.
pub type BoxedView = Arc<dyn View>;

// =============================================================================
// Built-in views
// =============================================================================

/// Redirects to a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectView {
    url: String,
}

impl RedirectView {
    /// Creates a redirect to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl View for RedirectView {
    fn is_redirect(&self) -> bool {
        true
    }

    fn render(&self, _model: &ModelMap, request: &WebRequest) -> anyhow::Result<RenderedView> {
        request.set_status(STATUS_FOUND);
        Ok(RenderedView::default().with_header("Location", self.url.clone()))
    }
}

/// Sentinel selected when no view matches the requested media types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotAcceptableView;

impl View for NotAcceptableView {
    fn render(&self, _model: &ModelMap, request: &WebRequest) -> anyhow::Result<RenderedView> {
        request.set_status(STATUS_NOT_ACCEPTABLE);
        Ok(RenderedView::default())
    }
}

type RenderFn = dyn Fn(&ModelMap, &WebRequest) -> anyhow::Result<String> + Send + Sync;

/// A view backed by a closure.
///
/// ```rust,ignore
/// let view = FnView::new(MediaType::application_json(), |model, _| {
///     Ok(format!("{{\"count\":{}}}", model.len()))
/// });
/// ```
pub struct FnView {
    name: String,
    content_type: Option<MediaType>,
    render: Box<RenderFn>,
}

impl FnView {
    /// Creates a view producing `content_type`.
    pub fn new<F>(content_type: MediaType, render: F) -> Self
    where
        F: Fn(&ModelMap, &WebRequest) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: content_type.to_string(),
            content_type: Some(content_type),
            render: Box::new(render),
        }
    }

    /// Creates a view without a declared content type.
    pub fn untyped<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&ModelMap, &WebRequest) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            content_type: None,
            render: Box::new(render),
        }
    }

    /// Names the view for diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wraps the view in a [`BoxedView`].
    pub fn boxed(self) -> BoxedView {
        Arc::new(self)
    }
}

impl fmt::Debug for FnView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnView")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl View for FnView {
    fn content_type(&self) -> Option<MediaType> {
        self.content_type.clone()
    }

    fn render(&self, model: &ModelMap, request: &WebRequest) -> anyhow::Result<RenderedView> {
        let body = (self.render)(model, request)?;
        Ok(RenderedView {
            content_type: self.content_type.clone(),
            headers: Vec::new(),
            body,
        })
    }
}
