//! Integration layer - External system interfaces.
//!
//! This module contains the seams through which the pipeline talks to
//! collaborators it does not own:
//! - Handler lookup by name (singleton and prototype instances)
//! - Path matching strategies

pub mod lookup;
pub mod path;

pub use lookup::{HandlerLookup, StaticHandlerLookup};
pub use path::{AntPathMatcher, PathMatcher};
