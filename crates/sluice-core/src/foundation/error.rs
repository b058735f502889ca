//! Unified error types for the Sluice core.
//!
//! This module provides the error types shared by the foundation and
//! integration layers. Pipeline-level errors (mapping, invocation, model
//! handling) are defined in sluice-framework.

use thiserror::Error;

// =============================================================================
// Media Type Errors
// =============================================================================

/// Errors that can occur while parsing media types.
#[derive(Debug, Clone, Error)]
pub enum MediaTypeError {
    /// The input could not be parsed into a media type.
    #[error("invalid media type '{input}': {reason}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Reason for failure.
        reason: String,
    },
}

impl MediaTypeError {
    /// Creates an invalid media type error.
    pub fn invalid(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// Errors returned by a [`HandlerLookup`](crate::HandlerLookup).
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// No handler is registered under the requested name.
    #[error("no handler named '{name}' is available")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// The handler exists but could not be created.
    #[error("handler '{name}' could not be created: {reason}")]
    CreationFailed {
        /// The requested name.
        name: String,
        /// Reason for failure.
        reason: String,
    },
}

impl LookupError {
    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a creation-failed error.
    pub fn creation_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for media type operations.
pub type MediaTypeResult<T> = Result<T, MediaTypeError>;

/// Result type for handler lookups.
pub type LookupResult<T> = Result<T, LookupError>;
