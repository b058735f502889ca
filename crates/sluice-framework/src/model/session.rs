//! Session-managed model attributes.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use sluice_core::{AttrValue, SessionAttributeStore, WebRequest};
use tracing::trace;

/// Declares which model attributes a controller keeps in the session.
///
/// ```rust,ignore
/// let declaration = SessionAttributes::new().name("cart").of_type::<UserProfile>();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionAttributes {
    names: Vec<String>,
    types: Vec<(TypeId, &'static str)>,
}

impl SessionAttributes {
    /// Creates an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute by name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Declares every attribute whose value is a `T`.
    pub fn of_type<T: 'static>(mut self) -> Self {
        self.types.push((TypeId::of::<T>(), std::any::type_name::<T>()));
        self
    }

    /// Returns `true` if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.types.is_empty()
    }
}

/// Manages the session attributes declared by one controller.
///
/// An attribute is session-managed if its name is declared or its value's
/// type is. Names of type-matched attributes are remembered, so retrieval and
/// cleanup on later requests work by name alone.
pub struct SessionAttributesHandler {
    attribute_names: HashSet<String>,
    attribute_types: HashSet<TypeId>,
    known_attribute_names: DashSet<String>,
    store: Arc<dyn SessionAttributeStore>,
}

impl SessionAttributesHandler {
    /// Creates a handler for `declaration`, persisting through `store`.
    pub fn new(declaration: &SessionAttributes, store: Arc<dyn SessionAttributeStore>) -> Self {
        let attribute_names: HashSet<String> = declaration.names.iter().cloned().collect();
        let known_attribute_names = DashSet::new();
        for name in &attribute_names {
            known_attribute_names.insert(name.clone());
        }

        Self {
            attribute_names,
            attribute_types: declaration.types.iter().map(|(id, _)| *id).collect(),
            known_attribute_names,
            store,
        }
    }

    /// Returns `true` if the controller declares any session attributes.
    pub fn has_session_attributes(&self) -> bool {
        !self.attribute_names.is_empty() || !self.attribute_types.is_empty()
    }

    /// Returns `true` if the attribute is session-managed, remembering its name.
    pub fn is_handler_session_attribute(&self, name: &str, type_id: TypeId) -> bool {
        if self.attribute_names.contains(name) || self.attribute_types.contains(&type_id) {
            if !self.known_attribute_names.contains(name) {
                self.known_attribute_names.insert(name.to_string());
            }
            true
        } else {
            false
        }
    }

    /// Stores the session-managed subset of `attributes`.
    pub fn store_attributes(&self, request: &WebRequest, attributes: &[(String, AttrValue)]) {
        for (name, value) in attributes {
            if self.is_handler_session_attribute(name, value.type_id()) {
                trace!(attribute = %name, "Storing session attribute");
                self.store.store_attribute(request, name, value.clone());
            }
        }
    }

    /// Retrieves every known session attribute present in the session.
    pub fn retrieve_attributes(&self, request: &WebRequest) -> Vec<(String, AttrValue)> {
        self.known_attribute_names()
            .into_iter()
            .filter_map(|name| {
                let value = self.store.retrieve_attribute(request, &name)?;
                Some((name, value))
            })
            .collect()
    }

    /// Retrieves one attribute, whether or not it is known.
    pub fn retrieve_attribute(&self, request: &WebRequest, name: &str) -> Option<AttrValue> {
        self.store.retrieve_attribute(request, name)
    }

    /// Removes every known session attribute from the session.
    pub fn cleanup_attributes(&self, request: &WebRequest) {
        for name in self.known_attribute_names() {
            trace!(attribute = %name, "Removing session attribute");
            self.store.cleanup_attribute(request, &name);
        }
    }

    /// Returns the names known so far, sorted.
    pub fn known_attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .known_attribute_names
            .iter()
            .map(|name| name.key().clone())
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for SessionAttributesHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAttributesHandler")
            .field("attribute_names", &self.attribute_names)
            .field("known_attribute_names", &self.known_attribute_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use sluice_core::{DefaultSessionAttributeStore, Session};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Profile {
        name: String,
    }

    fn handler() -> SessionAttributesHandler {
        SessionAttributesHandler::new(
            &SessionAttributes::new().name("cart").of_type::<Profile>(),
            Arc::new(DefaultSessionAttributeStore::new()),
        )
    }

    #[test]
    fn test_declared_names_and_types() {
        let handler = handler();
        assert!(handler.has_session_attributes());
        assert!(handler.is_handler_session_attribute("cart", TypeId::of::<String>()));
        assert!(!handler.is_handler_session_attribute("other", TypeId::of::<String>()));
        assert!(!SessionAttributesHandler::new(
            &SessionAttributes::new(),
            Arc::new(DefaultSessionAttributeStore::new())
        )
        .has_session_attributes());
    }

    #[test]
    fn test_type_match_memoizes_name() {
        let handler = handler();
        assert_eq!(handler.known_attribute_names(), vec!["cart"]);

        assert!(handler.is_handler_session_attribute("me", TypeId::of::<Profile>()));
        assert_eq!(handler.known_attribute_names(), vec!["cart", "me"]);
    }

    #[test]
    fn test_store_retrieve_cleanup_round_trip() {
        let handler = handler();
        let session = Session::new();

        let first = WebRequest::builder("/cart").session(session.clone()).build();
        handler.store_attributes(
            &first,
            &[
                ("cart".to_string(), AttrValue::collection(vec!["book".to_string()])),
                ("me".to_string(), AttrValue::object(Profile { name: "ada".into() })),
                ("page".to_string(), AttrValue::from(2)),
            ],
        );

        let second = WebRequest::builder("/cart").session(session.clone()).build();
        let names: Vec<String> = handler
            .retrieve_attributes(&second)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["cart", "me"]);

        handler.cleanup_attributes(&second);
        let third = WebRequest::builder("/cart").session(session).build();
        assert!(handler.retrieve_attributes(&third).is_empty());
        assert!(handler.retrieve_attribute(&third, "cart").is_none());
    }
}
