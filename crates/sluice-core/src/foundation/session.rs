//! Session storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::foundation::request::WebRequest;
use crate::foundation::value::AttrValue;

/// A session-scoped attribute store shared by all requests of one client.
///
/// Cloning a `Session` yields another handle to the same storage.
#[derive(Debug, Clone, Default)]
pub struct Session {
    attributes: Arc<RwLock<HashMap<String, AttrValue>>>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an attribute.
    pub fn get_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes.read().get(name).cloned()
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&self, name: impl Into<String>, value: AttrValue) {
        self.attributes.write().insert(name.into(), value);
    }

    /// Removes an attribute.
    pub fn remove_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes.write().remove(name)
    }

    /// Returns the names of all attributes.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.read().keys().cloned().collect()
    }

    /// Returns `true` if the session holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.read().is_empty()
    }

    /// Returns `true` if both handles share the same storage.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.attributes, &other.attributes)
    }
}

/// Strategy for storing model attributes in a backend session.
pub trait SessionAttributeStore: Send + Sync {
    /// Stores an attribute.
    fn store_attribute(&self, request: &WebRequest, name: &str, value: AttrValue);

    /// Retrieves an attribute.
    fn retrieve_attribute(&self, request: &WebRequest, name: &str) -> Option<AttrValue>;

    /// Removes an attribute.
    fn cleanup_attribute(&self, request: &WebRequest, name: &str);
}

/// Stores attributes in the request's [`Session`], under an optional prefix.
///
/// Storing creates the session if the request has none yet; retrieving and
/// cleaning up never do.
#[derive(Debug, Clone, Default)]
pub struct DefaultSessionAttributeStore {
    prefix: String,
}

impl DefaultSessionAttributeStore {
    /// Creates a store without a prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that prefixes every attribute name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the name under which `name` is kept in the session.
    pub fn attribute_name_in_session(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl SessionAttributeStore for DefaultSessionAttributeStore {
    fn store_attribute(&self, request: &WebRequest, name: &str, value: AttrValue) {
        let key = self.attribute_name_in_session(name);
        trace!(attribute = %key, "Storing session attribute");
        request.session_or_create().set_attribute(key, value);
    }

    fn retrieve_attribute(&self, request: &WebRequest, name: &str) -> Option<AttrValue> {
        request
            .session()?
            .get_attribute(&self.attribute_name_in_session(name))
    }

    fn cleanup_attribute(&self, request: &WebRequest, name: &str) {
        if let Some(session) = request.session() {
            let key = self.attribute_name_in_session(name);
            trace!(attribute = %key, "Removing session attribute");
            session.remove_attribute(&key);
        }
    }
}
