//! The request abstraction handed to the pipeline by a transport layer.
//!
//! A [`WebRequest`] is already parsed: it carries the lookup path, header
//! values, query/form parameters and an optional [`Session`]. During
//! dispatch the pipeline records its intermediate decisions as request
//! attributes (see [`attributes`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::foundation::media::MediaType;
use crate::foundation::session::Session;
use crate::foundation::value::AttrValue;

/// Well-known request attribute names.
pub mod attributes {
    /// The pattern that matched the lookup path best.
    pub const BEST_MATCHING_PATTERN: &str = "sluice.mapping.bestMatchingPattern";
    /// The part of the lookup path matched by wildcards.
    pub const PATH_WITHIN_HANDLER_MAPPING: &str = "sluice.mapping.pathWithinHandlerMapping";
    /// URI template variables extracted from the lookup path.
    pub const URI_TEMPLATE_VARIABLES: &str = "sluice.mapping.uriTemplateVariables";
    /// Media types the selected handler can produce.
    pub const PRODUCIBLE_MEDIA_TYPES: &str = "sluice.mapping.producibleMediaTypes";
    /// Media type chosen by content negotiation.
    pub const SELECTED_CONTENT_TYPE: &str = "sluice.view.selectedContentType";
    /// Value written directly as the response body.
    pub const RESPONSE_BODY: &str = "sluice.handler.responseBody";
}

/// Default response status.
pub const STATUS_OK: u16 = 200;

/// An already-parsed inbound request.
#[derive(Debug)]
pub struct WebRequest {
    path: String,
    headers: HashMap<String, String>,
    params: HashMap<String, Vec<String>>,
    attributes: RwLock<HashMap<String, AttrValue>>,
    status: AtomicU16,
    session: OnceCell<Session>,
}

impl WebRequest {
    /// Creates a request for the given lookup path.
    pub fn new(path: impl Into<String>) -> Self {
        Self::builder(path).build()
    }

    /// Starts building a request.
    pub fn builder(path: impl Into<String>) -> WebRequestBuilder {
        WebRequestBuilder {
            path: path.into(),
            headers: HashMap::new(),
            params: HashMap::new(),
            session: None,
        }
    }

    /// Returns the lookup path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a header value. Header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the raw `Accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    /// Returns the first value of a parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values of a parameter.
    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    // ─── Attributes ──────────────────────────────────────────────────────────

    /// Returns a request attribute.
    pub fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes.read().get(name).cloned()
    }

    /// Sets a request attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: AttrValue) {
        self.attributes.write().insert(name.into(), value);
    }

    /// Removes a request attribute.
    pub fn remove_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes.write().remove(name)
    }

    /// Returns the URI template variables exposed by the handler mapping.
    pub fn uri_template_variables(&self) -> HashMap<String, String> {
        self.attribute(attributes::URI_TEMPLATE_VARIABLES)
            .and_then(|v| v.downcast::<HashMap<String, String>>())
            .unwrap_or_default()
    }

    /// Returns the producible media types recorded for the selected handler.
    pub fn producible_media_types(&self) -> Option<Vec<MediaType>> {
        self.attribute(attributes::PRODUCIBLE_MEDIA_TYPES)
            .and_then(|v| v.downcast::<Vec<MediaType>>())
            .filter(|types| !types.is_empty())
    }

    /// Records the media types the selected handler can produce.
    pub fn set_producible_media_types(&self, media_types: Vec<MediaType>) {
        self.set_attribute(
            attributes::PRODUCIBLE_MEDIA_TYPES,
            AttrValue::collection(media_types),
        );
    }

    /// Returns the media type chosen by content negotiation.
    pub fn selected_content_type(&self) -> Option<MediaType> {
        self.attribute(attributes::SELECTED_CONTENT_TYPE)
            .and_then(|v| v.downcast::<MediaType>())
    }

    // ─── Response state ──────────────────────────────────────────────────────

    /// Returns the response status.
    pub fn status(&self) -> u16 {
        self.status.load(Ordering::Acquire)
    }

    /// Sets the response status.
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::Release);
    }

    // ─── Session ─────────────────────────────────────────────────────────────

    /// Returns the session, if one exists.
    pub fn session(&self) -> Option<&Session> {
        self.session.get()
    }

    /// Returns the session, creating it if necessary.
    pub fn session_or_create(&self) -> &Session {
        self.session.get_or_init(Session::new)
    }
}

/// Builder for [`WebRequest`].
#[derive(Debug)]
pub struct WebRequestBuilder {
    path: String,
    headers: HashMap<String, String>,
    params: HashMap<String, Vec<String>>,
    session: Option<Session>,
}

impl WebRequestBuilder {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the `Accept` header.
    pub fn accept(self, value: impl Into<String>) -> Self {
        self.header("accept", value)
    }

    /// Adds a parameter value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Attaches an existing session.
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Builds the request.
    pub fn build(self) -> WebRequest {
        let session = OnceCell::new();
        if let Some(s) = self.session {
            let _ = session.set(s);
        }
        WebRequest {
            path: self.path,
            headers: self.headers,
            params: self.params,
            attributes: RwLock::new(HashMap::new()),
            status: AtomicU16::new(STATUS_OK),
            session,
        }
    }
}
