//! # Sluice Core
//!
//! The core abstractions of the Sluice request dispatch pipeline.
//!
//! This crate provides the building blocks shared by every pipeline stage:
//! the request handed over by a transport layer, type-erased attribute
//! values, media types, sessions, handler lookup and path matching.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Core abstractions and type system:
//! - **Attribute Values**: Type-erased, cheaply cloneable values ([`AttrValue`])
//! - **Media Types**: Parsing, compatibility and specificity ordering ([`MediaType`])
//! - **Requests**: Parsed request state and request attributes ([`WebRequest`])
//! - **Sessions**: Session storage and attribute stores ([`Session`], [`SessionAttributeStore`])
//!
//! ### Integration Layer
//!
//! External system interfaces:
//! - **Handler Lookup**: Named handler instances ([`HandlerLookup`])
//! - **Path Matching**: Ant-style patterns ([`PathMatcher`], [`AntPathMatcher`])
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::{AntPathMatcher, MediaType, PathMatcher, WebRequest};
//!
//! let request = WebRequest::builder("/books/42")
//!     .accept("text/html;q=0.9, application/json")
//!     .build();
//!
//! let matcher = AntPathMatcher::new();
//! let vars = matcher
//!     .extract_uri_template_variables("/books/{id}", request.path())
//!     .unwrap();
//! assert_eq!(vars["id"], "42");
//!
//! let accepted = MediaType::parse_list(request.accept().unwrap()).unwrap();
//! assert_eq!(accepted.len(), 2);
//! ```

// Architectural layers
pub mod foundation;
pub mod integration;

// Re-export foundation types
pub use foundation::{
    AnyValue, AttrValue, DefaultSessionAttributeStore, LookupError, LookupResult, MediaType,
    MediaTypeError, MediaTypeResult, STATUS_OK, Session, SessionAttributeStore, ValueKind,
    WebRequest, WebRequestBuilder, attributes, conventions,
};

// Re-export integration types
pub use integration::{AntPathMatcher, HandlerLookup, PathMatcher, StaticHandlerLookup};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::integration::{HandlerLookup, PathMatcher};
}
