//! Handler return values.
//!
//! Whatever a handler function returns is converted into a [`ReturnValue`]
//! through [`IntoReturnValue`]. The variant decides how the
//! [`ReturnValueHandler`](super::ReturnValueHandler) chain treats it:
//!
//! | Rust return type            | Variant                     |
//! |-----------------------------|-----------------------------|
//! | `()`                        | [`ReturnValue::Void`]         |
//! | `String`, `&'static str`    | [`ReturnValue::ViewName`]     |
//! | [`BoxedView`]               | [`ReturnValue::View`]         |
//! | [`ModelAndView`]            | [`ReturnValue::ModelAndView`] |
//! | [`Attribute<T>`], `AttrValue` | [`ReturnValue::Attribute`]  |
//! | [`ResponseBody<T>`]         | [`ReturnValue::Body`]         |
//! | [`Callable`]                | [`ReturnValue::Async`]        |
//!
//! `Result<R, E>` and `Option<R>` wrap any of the above; `None` is treated as
//! `Void`.

use std::any::TypeId;
use std::fmt;

use sluice_core::{AnyValue, AttrValue};

use crate::deferred::Callable;
use crate::model::ModelAndView;
use crate::negotiation::BoxedView;

/// The declared return type of a handler method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnType {
    type_id: Option<TypeId>,
    type_name: Option<&'static str>,
    is_void: bool,
}

impl ReturnType {
    /// A method returning nothing.
    pub const fn void() -> Self {
        Self {
            type_id: None,
            type_name: None,
            is_void: true,
        }
    }

    /// A method whose declared type does not name its value.
    pub const fn opaque() -> Self {
        Self {
            type_id: None,
            type_name: None,
            is_void: false,
        }
    }

    /// A method returning a `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            type_name: Some(std::any::type_name::<T>()),
            is_void: false,
        }
    }

    /// Returns `true` for methods returning nothing.
    pub fn is_void(&self) -> bool {
        self.is_void
    }

    /// Returns the declared value type's name, if it names one.
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }

    /// Returns the declared value type's id, if it names one.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }
}

/// What a handler produced.
pub enum ReturnValue {
    /// Nothing; the view is derived from the request.
    Void,
    /// A logical view name, possibly prefixed with `redirect:`.
    ViewName(String),
    /// A view instance.
    View(BoxedView),
    /// A view and model pair.
    ModelAndView(ModelAndView),
    /// A value to add to the model.
    Attribute(AttrValue),
    /// A value written directly as the response.
    Body(AttrValue),
    /// A result produced asynchronously.
    Async(Callable),
}

impl ReturnValue {
    /// Returns a short label for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::ViewName(_) => "view name",
            Self::View(_) => "view",
            Self::ModelAndView(_) => "model and view",
            Self::Attribute(_) => "model attribute",
            Self::Body(_) => "response body",
            Self::Async(_) => "callable",
        }
    }

    /// Returns `true` for [`ReturnValue::Void`].
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Converts the value into a model attribute value, if it carries one.
    pub fn into_attribute(self) -> Option<AttrValue> {
        match self {
            Self::Attribute(value) | Self::Body(value) => Some(value),
            Self::ViewName(name) => Some(AttrValue::from(name)),
            _ => None,
        }
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("Void"),
            Self::ViewName(name) => f.debug_tuple("ViewName").field(name).finish(),
            Self::View(view) => f.debug_tuple("View").field(view).finish(),
            Self::ModelAndView(mav) => f.debug_tuple("ModelAndView").field(mav).finish(),
            Self::Attribute(value) => f.debug_tuple("Attribute").field(value).finish(),
            Self::Body(value) => f.debug_tuple("Body").field(value).finish(),
            Self::Async(callable) => f.debug_tuple("Async").field(callable).finish(),
        }
    }
}

/// Marks a return value as a model attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute<T>(pub T);

/// Marks a return value as the response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody<T>(pub T);

// =============================================================================
// IntoReturnValue
// =============================================================================

/// Types a handler function may return.
pub trait IntoReturnValue: Send + 'static {
    /// Describes the declared return type.
    fn return_type() -> ReturnType;

    /// Converts the value, surfacing handler faults as errors.
    fn into_return_value(self) -> anyhow::Result<ReturnValue>;
}

impl IntoReturnValue for () {
    fn return_type() -> ReturnType {
        ReturnType::void()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::Void)
    }
}

impl IntoReturnValue for String {
    fn return_type() -> ReturnType {
        ReturnType::of::<String>()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::ViewName(self))
    }
}

impl IntoReturnValue for &'static str {
    fn return_type() -> ReturnType {
        ReturnType::of::<String>()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::ViewName(self.to_string()))
    }
}

impl IntoReturnValue for BoxedView {
    fn return_type() -> ReturnType {
        ReturnType::opaque()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::View(self))
    }
}

impl IntoReturnValue for ModelAndView {
    fn return_type() -> ReturnType {
        ReturnType::opaque()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::ModelAndView(self))
    }
}

impl IntoReturnValue for AttrValue {
    fn return_type() -> ReturnType {
        ReturnType::opaque()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::Attribute(self))
    }
}

impl<T: AnyValue> IntoReturnValue for Attribute<T> {
    fn return_type() -> ReturnType {
        ReturnType::of::<T>()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::Attribute(AttrValue::object(self.0)))
    }
}

impl<T: AnyValue> IntoReturnValue for ResponseBody<T> {
    fn return_type() -> ReturnType {
        ReturnType::of::<T>()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::Body(AttrValue::object(self.0)))
    }
}

impl IntoReturnValue for Callable {
    fn return_type() -> ReturnType {
        ReturnType::opaque()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(ReturnValue::Async(self))
    }
}

impl IntoReturnValue for ReturnValue {
    fn return_type() -> ReturnType {
        ReturnType::opaque()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        Ok(self)
    }
}

impl<R: IntoReturnValue> IntoReturnValue for Option<R> {
    fn return_type() -> ReturnType {
        R::return_type()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        match self {
            Some(value) => value.into_return_value(),
            None => Ok(ReturnValue::Void),
        }
    }
}

impl<R, E> IntoReturnValue for Result<R, E>
where
    R: IntoReturnValue,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn return_type() -> ReturnType {
        R::return_type()
    }

    fn into_return_value(self) -> anyhow::Result<ReturnValue> {
        match self {
            Ok(value) => value.into_return_value(),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Book {
        title: String,
    }

    #[test]
    fn test_return_types() {
        assert!(<() as IntoReturnValue>::return_type().is_void());
        assert_eq!(
            <Attribute<Book> as IntoReturnValue>::return_type().type_id(),
            Some(TypeId::of::<Book>())
        );
        assert_eq!(
            <anyhow::Result<Option<Attribute<Book>>> as IntoReturnValue>::return_type().type_name(),
            Some(std::any::type_name::<Book>())
        );
        assert_eq!(<AttrValue as IntoReturnValue>::return_type().type_name(), None);
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            "books/list".into_return_value().unwrap(),
            ReturnValue::ViewName(name) if name == "books/list"
        ));
        assert!(None::<String>.into_return_value().unwrap().is_void());

        let value = Attribute(Book {
            title: "Dune".into(),
        })
        .into_return_value()
        .unwrap()
        .into_attribute()
        .unwrap();
        assert_eq!(value.downcast_ref::<Book>().map(|b| b.title.as_str()), Some("Dune"));
    }

    #[test]
    fn test_error_is_kept() {
        #[derive(Debug, thiserror::Error)]
        #[error("out of stock")]
        struct OutOfStock;

        let result: Result<String, OutOfStock> = Err(OutOfStock);
        let err = result.into_return_value().unwrap_err();
        assert!(err.downcast_ref::<OutOfStock>().is_some());
    }
}
