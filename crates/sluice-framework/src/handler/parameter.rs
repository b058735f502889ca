//! Handler method parameters and argument types.
//!
//! Handler functions declare what they need through their argument types.
//! Each argument type implements [`FromArgument`], which describes the
//! parameter (declared type, annotation, conversion) at registration time
//! and recovers the typed value from a resolved [`AttrValue`] at call time.
//!
//! ```rust,ignore
//! fn show(
//!     controller: &BookController,
//!     id: PathVariable<u64>,
//!     book: ModelAttribute<BookForm>,
//!     status: SessionStatus,
//! ) -> String {
//!     // ...
//! }
//! ```

use std::any::TypeId;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use sluice_core::{AnyValue, AttrValue, conventions};

use crate::model::{ModelMap, SessionStatus};

/// Converts a raw string (path variable, request parameter) to a value.
pub type Converter = fn(&str) -> Option<AttrValue>;

/// Creates a default value for a parameter.
pub type Factory = fn() -> AttrValue;

/// How a parameter obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamAnnotation {
    /// Plain parameter; only provided values or custom resolvers supply it.
    None,
    /// A URI template variable.
    PathVariable,
    /// A request parameter.
    RequestParam,
    /// A model attribute, created on demand when absent.
    ModelAttribute {
        /// Whether data binding applies to the attribute.
        binding: bool,
    },
    /// A raw session attribute.
    SessionAttribute,
    /// The [`SessionStatus`] handle.
    SessionStatus,
    /// The live [`ModelMap`].
    Model,
}

/// Describes one parameter of a handler method.
#[derive(Clone)]
pub struct MethodParameter {
    index: usize,
    type_id: TypeId,
    type_name: &'static str,
    annotation: ParamAnnotation,
    name: Option<String>,
    default_value: Option<String>,
    converter: Option<Converter>,
    factory: Option<Factory>,
}

impl MethodParameter {
    /// Creates a parameter declared as type `T`.
    pub fn new<T: 'static>(index: usize, annotation: ParamAnnotation) -> Self {
        Self {
            index,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            annotation,
            name: None,
            default_value: None,
            converter: None,
            factory: None,
        }
    }

    /// Sets the converter for raw string values.
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Sets the factory for absent values.
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Returns the parameter index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the declared type's `TypeId`.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the declared type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the annotation.
    pub fn annotation(&self) -> ParamAnnotation {
        self.annotation
    }

    /// Returns the explicit name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the explicit name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Returns the default raw value, if any.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Sets the default raw value.
    pub fn set_default_value(&mut self, value: impl Into<String>) {
        self.default_value = Some(value.into());
    }

    /// Disables data binding for a model attribute parameter.
    pub fn set_binding(&mut self, binding: bool) {
        if let ParamAnnotation::ModelAttribute { .. } = self.annotation {
            self.annotation = ParamAnnotation::ModelAttribute { binding };
        }
    }

    /// Returns `true` for model attribute parameters.
    pub fn is_model_attribute(&self) -> bool {
        matches!(self.annotation, ParamAnnotation::ModelAttribute { .. })
    }

    /// Returns the explicit name or one derived from the declared type.
    pub fn attribute_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| conventions::variable_name(self.type_name))
    }

    /// Converts a raw string value.
    pub fn convert(&self, raw: &str) -> Option<AttrValue> {
        self.converter.and_then(|convert| convert(raw))
    }

    /// Creates a default value, if the parameter has a factory.
    pub fn create_default(&self) -> Option<AttrValue> {
        self.factory.map(|create| create())
    }

    /// Returns `true` if `value` has the declared type.
    pub fn accepts(&self, value: &AttrValue) -> bool {
        value.type_id() == self.type_id
    }
}

impl fmt::Debug for MethodParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodParameter")
            .field("index", &self.index)
            .field("type", &self.type_name)
            .field("annotation", &self.annotation)
            .field("name", &self.name)
            .finish()
    }
}

/// Types usable as handler arguments.
pub trait FromArgument: Sized + Send + 'static {
    /// Describes the parameter at position `index`.
    fn parameter(index: usize) -> MethodParameter;

    /// Recovers the argument from a resolved value.
    fn from_value(value: &AttrValue) -> Option<Self>;
}

fn parse_simple<T: AnyValue + FromStr>(raw: &str) -> Option<AttrValue> {
    raw.parse::<T>().ok().map(AttrValue::simple)
}

fn default_object<T: AnyValue + Default>() -> AttrValue {
    AttrValue::object(T::default())
}

macro_rules! wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name<T>(pub T);

        impl<T> $name<T> {
            /// Unwraps the inner value.
            pub fn into_inner(self) -> T {
                self.0
            }
        }

        impl<T> Deref for $name<T> {
            type Target = T;

            fn deref(&self) -> &T {
                &self.0
            }
        }

        impl<T> DerefMut for $name<T> {
            fn deref_mut(&mut self) -> &mut T {
                &mut self.0
            }
        }
    };
}

wrapper!(
    /// A plain argument of type `T`, supplied as a provided value or by a custom resolver.
    Arg
);
wrapper!(
    /// A URI template variable converted with `FromStr`.
    PathVariable
);
wrapper!(
    /// A request parameter converted with `FromStr`.
    RequestParam
);
wrapper!(
    /// A model attribute; created with `Default` when the model lacks it.
    ModelAttribute
);
wrapper!(
    /// A raw session attribute that must already exist.
    SessionAttribute
);

impl<T: AnyValue + Clone> FromArgument for Arg<T> {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<T>(index, ParamAnnotation::None)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<T>().map(Self)
    }
}

impl<T: AnyValue + Clone + FromStr> FromArgument for PathVariable<T> {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<T>(index, ParamAnnotation::PathVariable)
            .with_converter(parse_simple::<T>)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<T>().map(Self)
    }
}

impl<T: AnyValue + Clone + FromStr> FromArgument for RequestParam<T> {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<T>(index, ParamAnnotation::RequestParam)
            .with_converter(parse_simple::<T>)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<T>().map(Self)
    }
}

impl<T: AnyValue + Clone + Default> FromArgument for ModelAttribute<T> {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<T>(index, ParamAnnotation::ModelAttribute { binding: true })
            .with_factory(default_object::<T>)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<T>().map(Self)
    }
}

impl<T: AnyValue + Clone> FromArgument for SessionAttribute<T> {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<T>(index, ParamAnnotation::SessionAttribute)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<T>().map(Self)
    }
}

impl FromArgument for SessionStatus {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<SessionStatus>(index, ParamAnnotation::SessionStatus)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<SessionStatus>()
    }
}

impl FromArgument for ModelMap {
    fn parameter(index: usize) -> MethodParameter {
        MethodParameter::new::<ModelMap>(index, ParamAnnotation::Model)
    }

    fn from_value(value: &AttrValue) -> Option<Self> {
        value.downcast::<ModelMap>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct BookForm {
        title: String,
    }

    #[test]
    fn test_path_variable_parameter_converts() {
        let param = <PathVariable<u64> as FromArgument>::parameter(1);
        assert_eq!(param.index(), 1);
        assert_eq!(param.type_id(), TypeId::of::<u64>());
        assert_eq!(param.annotation(), ParamAnnotation::PathVariable);

        let value = param.convert("42").unwrap();
        assert_eq!(PathVariable::<u64>::from_value(&value), Some(PathVariable(42)));
        assert!(param.convert("forty-two").is_none());
    }

    #[test]
    fn test_model_attribute_naming_and_factory() {
        let mut param = <ModelAttribute<BookForm> as FromArgument>::parameter(0);
        assert_eq!(param.attribute_name(), "bookForm");
        assert!(param.is_model_attribute());

        let created = param.create_default().unwrap();
        assert!(param.accepts(&created));

        param.set_name("form");
        param.set_binding(false);
        assert_eq!(param.attribute_name(), "form");
        assert_eq!(
            param.annotation(),
            ParamAnnotation::ModelAttribute { binding: false }
        );
    }

    #[test]
    fn test_wrappers_deref() {
        let mut arg = Arg(String::from("x"));
        arg.push('y');
        assert_eq!(arg.as_str(), "xy");
        assert_eq!(arg.into_inner(), "xy");
    }
}
