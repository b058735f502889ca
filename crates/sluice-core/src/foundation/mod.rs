//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of the Sluice pipeline:
//! - Type-erased attribute values shared by models, sessions and requests
//! - Media types and their specificity ordering
//! - The request and session abstractions handed over by a transport layer

pub mod error;
pub mod media;
pub mod request;
pub mod session;
pub mod value;

pub use error::{LookupError, LookupResult, MediaTypeError, MediaTypeResult};
pub use media::MediaType;
pub use request::{STATUS_OK, WebRequest, WebRequestBuilder, attributes};
pub use session::{DefaultSessionAttributeStore, Session, SessionAttributeStore};
pub use value::{AnyValue, AttrValue, ValueKind, conventions};
