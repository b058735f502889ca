//! Error types for the Sluice framework.

use sluice_core::{LookupError, MediaTypeError};
use thiserror::Error;

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors raised while registering or resolving handlers.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    /// A pattern is already bound to a different handler.
    #[error(
        "cannot map handler [{handler}] to URL path [{pattern}]: there is already handler [{existing}] mapped"
    )]
    ConfigurationConflict {
        /// The contested pattern.
        pattern: String,
        /// The handler being registered.
        handler: String,
        /// The handler already registered.
        existing: String,
    },

    /// A handler registered by name could not be looked up.
    #[error("failed to obtain handler for [{pattern}]: {source}")]
    Lookup {
        /// The pattern the handler is registered under.
        pattern: String,
        /// The underlying lookup failure.
        #[source]
        source: LookupError,
    },

    /// A handler was registered by name but no lookup is configured.
    #[error("handler [{name}] is registered by name but no handler lookup is configured")]
    NoLookup {
        /// The handler name.
        name: String,
    },
}

// =============================================================================
// Invocation Errors
// =============================================================================

/// Errors raised while resolving arguments for, or invoking, a handler method.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// No provided value matched and no resolver supports the parameter.
    #[error("could not resolve parameter [{index}] of type [{type_name}] in {method}: {reason}")]
    ArgumentResolution {
        /// Parameter index.
        index: usize,
        /// Declared parameter type.
        type_name: &'static str,
        /// The handler method.
        method: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A resolver supported the parameter but failed to produce a value.
    #[error("resolving parameter [{index}] of type [{type_name}] in {method} failed: {source}")]
    Resolver {
        /// Parameter index.
        index: usize,
        /// Declared parameter type.
        type_name: &'static str,
        /// The handler method.
        method: String,
        /// The resolver failure.
        #[source]
        source: anyhow::Error,
    },

    /// The bound instance is not of the type the method was declared on.
    #[error("handler target mismatch in {method}: expected [{expected}], got [{actual}]")]
    TargetMismatch {
        /// The handler method.
        method: String,
        /// Declared bean type.
        expected: &'static str,
        /// Bound bean type.
        actual: &'static str,
    },

    /// The invocation machinery itself failed (e.g. argument conversion).
    #[error("{message}")]
    IllegalState {
        /// Description including the resolved arguments.
        message: String,
    },

    /// The handler body returned an error. Kept verbatim.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl InvocationError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Returns the handler's own error, if this is a handler fault.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Handler(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// Model Errors
// =============================================================================

/// Errors raised while initializing or updating the model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A session-managed attribute required by the handler is missing.
    #[error("expected session attribute '{name}' required by {method}")]
    RequiredStateMissing {
        /// Attribute name.
        name: String,
        /// The handler method.
        method: String,
    },

    /// A model-contributing method failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

// =============================================================================
// Return Value Errors
// =============================================================================

/// Errors raised while handling a handler's return value.
#[derive(Debug, Error)]
pub enum ReturnValueError {
    /// No registered handler supports the value.
    #[error("unknown return value kind [{kind}] from {method}")]
    Unsupported {
        /// Kind of return value.
        kind: &'static str,
        /// The handler method.
        method: String,
    },

    /// A return value handler failed.
    #[error("handling the {kind} returned by {method} failed: {source}")]
    Failed {
        /// Kind of return value.
        kind: &'static str,
        /// The handler method.
        method: String,
        /// The handler failure.
        #[source]
        source: anyhow::Error,
    },
}

// =============================================================================
// Negotiation Errors
// =============================================================================

/// Errors raised during view resolution.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Requested media types could not be determined.
    #[error("could not resolve requested media types: {0}")]
    MediaType(#[from] MediaTypeError),

    /// A delegate view resolver failed.
    #[error("view resolver failed for view name '{view_name}': {source}")]
    Resolver {
        /// The view name being resolved.
        view_name: String,
        /// The resolver failure.
        #[source]
        source: anyhow::Error,
    },
}

// =============================================================================
// Async Errors
// =============================================================================

/// Errors raised by asynchronous result processing.
#[derive(Debug, Error)]
pub enum AsyncError {
    /// An interceptor refused to start concurrent handling.
    #[error("concurrent handling was rejected: {0}")]
    Rejected(anyhow::Error),

    /// The task did not complete in time and no interceptor produced a result.
    #[error("async task '{task}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Task description.
        task: String,
        /// Configured timeout.
        timeout_ms: u64,
    },
}

// =============================================================================
// Handling Errors
// =============================================================================

/// Any error raised by the handler adapter.
#[derive(Debug, Error)]
pub enum HandlingError {
    /// Model initialization or update failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Argument resolution or invocation failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// Return value handling failed.
    #[error(transparent)]
    ReturnValue(#[from] ReturnValueError),

    /// Asynchronous processing failed.
    #[error(transparent)]
    Async(#[from] AsyncError),
}

impl HandlingError {
    /// Returns the handler's own error, if a handler body failed.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Invocation(e) | Self::Model(ModelError::Invocation(e)) => e.handler_error(),
            _ => None,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for invocation.
pub type InvocationResult<T> = Result<T, InvocationError>;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for the handler adapter.
pub type HandlingResult<T> = Result<T, HandlingError>;
