//! Determining the media types a request asks for.

use std::sync::Arc;

use sluice_core::{MediaType, MediaTypeError, MediaTypeResult, WebRequest};

/// Resolves the requested media types of a request.
pub trait ContentNegotiationStrategy: Send + Sync {
    /// Returns the requested media types, or `[*/*]` when nothing is requested.
    fn resolve_media_types(&self, request: &WebRequest) -> MediaTypeResult<Vec<MediaType>>;
}

fn all_list() -> Vec<MediaType> {
    vec![MediaType::all()]
}

fn is_all_list(media_types: &[MediaType]) -> bool {
    matches!(media_types, [only] if *only == MediaType::all())
}

/// Reads the `Accept` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderStrategy;

impl ContentNegotiationStrategy for HeaderStrategy {
    fn resolve_media_types(&self, request: &WebRequest) -> MediaTypeResult<Vec<MediaType>> {
        let Some(accept) = request.accept().filter(|value| !value.trim().is_empty()) else {
            return Ok(all_list());
        };
        let mut media_types = MediaType::parse_list(accept)?;
        MediaType::sort_by_specificity_and_quality(&mut media_types);
        Ok(media_types)
    }
}

/// File extensions mapped to media types.
#[derive(Debug, Clone, Default)]
pub struct MediaTypeMappings {
    entries: Vec<(String, MediaType)>,
}

impl MediaTypeMappings {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mappings for `json`, `xml`, `html` and `txt`.
    pub fn common() -> Self {
        Self::new()
            .with("json", MediaType::application_json())
            .with("xml", MediaType::application_xml())
            .with("html", MediaType::text_html())
            .with("txt", MediaType::text_plain())
    }

    /// Adds a mapping; extensions are case-insensitive.
    pub fn with(mut self, extension: impl Into<String>, media_type: MediaType) -> Self {
        self.add(extension, media_type);
        self
    }

    /// Adds a mapping, replacing an earlier one for the same extension.
    pub fn add(&mut self, extension: impl Into<String>, media_type: MediaType) {
        let extension = extension.into().to_ascii_lowercase();
        match self.entries.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(entry) => entry.1 = media_type,
            None => self.entries.push((extension, media_type)),
        }
    }

    /// Returns the media type for `extension`.
    pub fn lookup(&self, extension: &str) -> Option<&MediaType> {
        let extension = extension.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, media_type)| media_type)
    }

    /// Returns the extensions registered for `media_type`, ignoring its quality.
    pub fn extensions_for(&self, media_type: &MediaType) -> Vec<String> {
        let media_type = media_type.remove_quality_value();
        self.entries
            .iter()
            .filter(|(_, mapped)| *mapped == media_type)
            .map(|(ext, _)| ext.clone())
            .collect()
    }

    /// Returns `true` if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads a request parameter such as `?format=json`.
#[derive(Debug, Clone)]
pub struct ParameterStrategy {
    parameter_name: String,
    mappings: MediaTypeMappings,
}

impl ParameterStrategy {
    /// Creates a strategy reading `format`.
    pub fn new(mappings: MediaTypeMappings) -> Self {
        Self {
            parameter_name: "format".to_string(),
            mappings,
        }
    }

    /// Changes the parameter name.
    pub fn with_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = name.into();
        self
    }

    /// Returns the parameter name.
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }
}

impl ContentNegotiationStrategy for ParameterStrategy {
    fn resolve_media_types(&self, request: &WebRequest) -> MediaTypeResult<Vec<MediaType>> {
        let Some(key) = request.parameter(&self.parameter_name).filter(|key| !key.is_empty()) else {
            return Ok(all_list());
        };
        match self.mappings.lookup(key) {
            Some(media_type) => Ok(vec![media_type.clone()]),
            None => Err(MediaTypeError::invalid(
                key,
                format!("no media type registered for {} '{key}'", self.parameter_name),
            )),
        }
    }
}

/// Always returns the same media types.
#[derive(Debug, Clone)]
pub struct FixedStrategy {
    media_types: Vec<MediaType>,
}

impl FixedStrategy {
    /// Creates a strategy returning `media_types`.
    pub fn new(media_types: Vec<MediaType>) -> Self {
        Self { media_types }
    }
}

impl ContentNegotiationStrategy for FixedStrategy {
    fn resolve_media_types(&self, _request: &WebRequest) -> MediaTypeResult<Vec<MediaType>> {
        Ok(self.media_types.clone())
    }
}

/// Consults strategies in order to find the requested media types.
#[derive(Clone)]
pub struct ContentNegotiationManager {
    strategies: Vec<Arc<dyn ContentNegotiationStrategy>>,
    mappings: MediaTypeMappings,
}

impl ContentNegotiationManager {
    /// Creates a manager with the given strategies and no extension mappings.
    pub fn new(strategies: Vec<Arc<dyn ContentNegotiationStrategy>>) -> Self {
        Self {
            strategies,
            mappings: MediaTypeMappings::new(),
        }
    }

    /// Sets the extension mappings used by [`resolve_file_extensions`](Self::resolve_file_extensions).
    pub fn with_mappings(mut self, mappings: MediaTypeMappings) -> Self {
        self.mappings = mappings;
        self
    }

    /// Returns the first strategy result other than `[*/*]`, or `[*/*]`.
    pub fn resolve_media_types(&self, request: &WebRequest) -> MediaTypeResult<Vec<MediaType>> {
        for strategy in &self.strategies {
            let media_types = strategy.resolve_media_types(request)?;
            if is_all_list(&media_types) {
                continue;
            }
            return Ok(media_types);
        }
        Ok(all_list())
    }

    /// Returns the file extensions registered for `media_type`.
    pub fn resolve_file_extensions(&self, media_type: &MediaType) -> Vec<String> {
        self.mappings.extensions_for(media_type)
    }

    /// Returns the extension mappings.
    pub fn mappings(&self) -> &MediaTypeMappings {
        &self.mappings
    }
}

impl Default for ContentNegotiationManager {
    fn default() -> Self {
        Self::new(vec![Arc::new(HeaderStrategy)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_strategy_sorts() {
        let request = WebRequest::builder("/")
            .accept("text/*;q=0.9, application/json;q=0.5, text/html")
            .build();
        let types = HeaderStrategy.resolve_media_types(&request).unwrap();
        let rendered: Vec<String> = types.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["text/html", "application/json;q=0.5", "text/*;q=0.9"]);

        let types = HeaderStrategy.resolve_media_types(&WebRequest::new("/")).unwrap();
        assert_eq!(types, vec![MediaType::all()]);
    }

    #[test]
    fn test_parameter_strategy() {
        let strategy = ParameterStrategy::new(MediaTypeMappings::common());
        let request = WebRequest::builder("/").param("format", "JSON").build();
        assert_eq!(
            strategy.resolve_media_types(&request).unwrap(),
            vec![MediaType::application_json()]
        );

        let request = WebRequest::builder("/").param("format", "pdf").build();
        assert!(strategy.resolve_media_types(&request).is_err());
    }

    #[test]
    fn test_manager_skips_all_results() {
        let manager = ContentNegotiationManager::new(vec![
            Arc::new(ParameterStrategy::new(MediaTypeMappings::common())),
            Arc::new(HeaderStrategy),
        ])
        .with_mappings(MediaTypeMappings::common());

        let request = WebRequest::builder("/").accept("application/xml").build();
        assert_eq!(
            manager.resolve_media_types(&request).unwrap(),
            vec![MediaType::application_xml()]
        );
        assert_eq!(
            manager.resolve_file_extensions(&MediaType::parse("text/html;q=0.7").unwrap()),
            vec!["html"]
        );
    }
}
