//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sluice_core::MediaType;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SluiceConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Handler mapping settings.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Content negotiation settings.
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Deferred result settings.
    #[serde(default, rename = "async")]
    pub async_processing: AsyncConfig,

    /// Session attribute settings.
    #[serde(default)]
    pub session: SessionConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
    Minutely,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Span events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Log file rotation.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `sluice_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
            filters: HashMap::new(),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Handler mapping configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Let `/users` also match `/users/`.
    #[serde(default)]
    pub use_trailing_slash_match: bool,

    /// Materialize named handlers on first use instead of at registration.
    #[serde(default)]
    pub lazy_init_handlers: bool,
}

/// Content negotiation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Answer 406 when no view matches the requested media types.
    #[serde(default)]
    pub use_not_acceptable_status: bool,

    /// Consult a request parameter before the `Accept` header.
    #[serde(default)]
    pub favor_parameter: bool,

    /// Name of the request parameter.
    #[serde(default = "default_parameter_name")]
    pub parameter_name: String,

    /// Ignore the `Accept` header.
    #[serde(default)]
    pub ignore_accept_header: bool,

    /// File extensions and the media types they stand for.
    #[serde(default = "default_media_types")]
    pub media_types: BTreeMap<String, String>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            use_not_acceptable_status: false,
            favor_parameter: false,
            parameter_name: default_parameter_name(),
            ignore_accept_header: false,
            media_types: default_media_types(),
        }
    }
}

impl NegotiationConfig {
    /// Parses the configured media types, keyed by lowercase extension.
    pub fn media_type_mappings(&self) -> ConfigResult<BTreeMap<String, MediaType>> {
        self.media_types
            .iter()
            .map(|(extension, value)| {
                MediaType::parse(value)
                    .map(|media_type| (extension.to_lowercase(), media_type))
                    .map_err(|source| ConfigError::InvalidMediaType {
                        extension: extension.clone(),
                        source,
                    })
            })
            .collect()
    }
}

fn default_parameter_name() -> String {
    "format".to_string()
}

fn default_media_types() -> BTreeMap<String, String> {
    [
        ("html", "text/html"),
        ("json", "application/json"),
        ("txt", "text/plain"),
        ("xml", "application/xml"),
    ]
    .into_iter()
    .map(|(ext, media_type)| (ext.to_string(), media_type.to_string()))
    .collect()
}

/// Deferred result configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsyncConfig {
    /// Timeout for deferred results that do not set their own.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl AsyncConfig {
    /// Returns the timeout as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Session attribute configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Prefix of the session keys model attributes are stored under.
    #[serde(default)]
    pub attribute_prefix: String,
}
