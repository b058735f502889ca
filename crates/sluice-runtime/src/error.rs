//! Runtime error types.

use sluice_framework::{HandlingError, MappingError, NegotiationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running a dispatcher.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Handler registration or resolution failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The handler, its arguments or its model failed.
    #[error(transparent)]
    Handling(#[from] HandlingError),

    /// Content negotiation failed.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// No view resolver knows the view name.
    #[error("Could not resolve view with name '{view_name}'")]
    ViewNotResolved { view_name: String },

    /// A view resolver failed.
    #[error("Resolving view '{view_name}' failed: {source}")]
    ViewResolution {
        view_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The selected view failed to render.
    #[error("Rendering view {view} failed: {source}")]
    Render {
        view: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RuntimeError {
    /// Returns the handler's own error, if a handler body failed.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Handling(e) => e.handler_error(),
            _ => None,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
