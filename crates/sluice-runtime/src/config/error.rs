//! Configuration errors.

use std::path::PathBuf;

use sluice_core::MediaTypeError;
use thiserror::Error;

/// Why configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file {0} does not exist")]
    FileNotFound(PathBuf),

    /// A source could not be read or does not match the schema.
    #[error("Invalid configuration source: {0}")]
    ParseError(String),

    /// A value is out of range or inconsistent with another.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// A media type in `negotiation.media_types` does not parse.
    #[error("Invalid media type for extension '{extension}': {source}")]
    InvalidMediaType {
        extension: String,
        #[source]
        source: MediaTypeError,
    },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
