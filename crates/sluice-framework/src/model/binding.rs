//! Binding result companions for model attributes.

use sluice_core::{AttrValue, ValueKind, WebRequest};

/// Prefix of the model key under which an attribute's binding result is kept.
pub const BINDING_RESULT_PREFIX: &str = "sluice.validation.BindingResult.";

/// Returns the model key of the binding result for `name`.
pub fn binding_result_key(name: &str) -> String {
    format!("{BINDING_RESULT_PREFIX}{name}")
}

/// Validation state attached to a bound model attribute.
#[derive(Debug, Clone)]
pub struct BindingResult {
    object_name: String,
    target: AttrValue,
    errors: Vec<String>,
}

impl BindingResult {
    /// Creates an empty result for `target`.
    pub fn new(object_name: impl Into<String>, target: AttrValue) -> Self {
        Self {
            object_name: object_name.into(),
            target,
            errors: Vec::new(),
        }
    }

    /// Returns the attribute name.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Returns the bound value.
    pub fn target(&self) -> &AttrValue {
        &self.target
    }

    /// Records an error.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Returns the recorded errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns `true` if any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Wraps the result as a model attribute value.
    pub fn into_value(self) -> AttrValue {
        AttrValue::new(self, ValueKind::BindingResult)
    }
}

/// Creates binding results for model attributes.
pub trait BindingResultFactory: Send + Sync {
    /// Creates the binding result for `target`, stored under `name`.
    fn create_binding_result(&self, request: &WebRequest, target: &AttrValue, name: &str) -> BindingResult;
}

/// Creates empty binding results.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBindingResultFactory;

impl BindingResultFactory for DefaultBindingResultFactory {
    fn create_binding_result(&self, _request: &WebRequest, target: &AttrValue, name: &str) -> BindingResult {
        BindingResult::new(name, target.clone())
    }
}
