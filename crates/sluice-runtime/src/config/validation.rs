//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AsyncConfig, LogOutput, LoggingConfig, NegotiationConfig, SluiceConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SluiceConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_negotiation_config(&config.negotiation)?;
    validate_async_config(&config.async_processing)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "File log output requires logging.file_path",
        ));
    }

    for module in logging.filters.keys() {
        if module.trim().is_empty() {
            return Err(ConfigError::validation("Log filter module must not be empty"));
        }
    }

    Ok(())
}

fn validate_negotiation_config(negotiation: &NegotiationConfig) -> ConfigResult<()> {
    if negotiation.favor_parameter && negotiation.parameter_name.trim().is_empty() {
        return Err(ConfigError::validation(
            "Format parameter name must not be empty when favor_parameter is set",
        ));
    }

    for extension in negotiation.media_types.keys() {
        if extension.is_empty() || extension.starts_with('.') {
            return Err(ConfigError::validation(format!(
                "Invalid file extension '{extension}', expected a bare name such as 'json'"
            )));
        }
    }

    // Surfaces the first unparsable media type.
    negotiation.media_type_mappings()?;
    Ok(())
}

fn validate_async_config(config: &AsyncConfig) -> ConfigResult<()> {
    if config.timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "Async timeout must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SluiceConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = SluiceConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("/var/log/sluice"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_media_type() {
        let mut config = SluiceConfig::default();
        config
            .negotiation
            .media_types
            .insert("csv".to_string(), "not a media type".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMediaType { ref extension, .. } if extension == "csv"));
    }

    #[test]
    fn test_dotted_extension_rejected() {
        let mut config = SluiceConfig::default();
        config
            .negotiation
            .media_types
            .insert(".csv".to_string(), "text/csv".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SluiceConfig::default();
        config.async_processing.timeout_ms = Some(0);
        assert!(validate_config(&config).is_err());

        config.async_processing.timeout_ms = Some(5_000);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_parameter_name_with_favor_parameter() {
        let mut config = SluiceConfig::default();
        config.negotiation.favor_parameter = true;
        config.negotiation.parameter_name = String::new();
        assert!(validate_config(&config).is_err());
    }
}
