//! Configuration for the dispatch runtime.
//!
//! Settings are loaded with figment from config files and `SLUICE_*`
//! environment variables, then validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    AsyncConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MappingConfig,
    NegotiationConfig, SessionConfig, SluiceConfig, SpanEventConfig,
};
pub use validation::validate_config;
