//! Type-erased attribute values.
//!
//! Model attributes, session attributes, request attributes and handler
//! arguments all travel through the pipeline as [`AttrValue`]s: cheap-clone
//! handles over an `Arc<dyn AnyValue>` that remember the concrete type they
//! were built from.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Values that can be stored as attributes.
///
/// Blanket-implemented for every `Debug + Send + Sync + 'static` type.
pub trait AnyValue: Any + fmt::Debug + Send + Sync {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> AnyValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Coarse classification of an attribute value.
///
/// Used when deciding whether a model attribute is a candidate for data
/// binding: simple values, arrays, collections and maps never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Strings, numbers, booleans and other scalar values.
    Simple,
    /// Fixed-size arrays.
    Array,
    /// Lists and sets.
    Collection,
    /// Key/value maps.
    Map,
    /// Any other value (domain objects, form backing objects).
    Object,
    /// A binding result companion.
    BindingResult,
}

impl ValueKind {
    /// Returns `true` for simple values, arrays, collections and maps.
    pub fn is_plain(self) -> bool {
        matches!(self, Self::Simple | Self::Array | Self::Collection | Self::Map)
    }
}

/// A type-erased, cheaply cloneable attribute value.
#[derive(Clone)]
pub struct AttrValue {
    inner: Arc<dyn AnyValue>,
    type_id: TypeId,
    type_name: &'static str,
    kind: ValueKind,
}

impl AttrValue {
    /// Wraps a value with an explicit kind.
    pub fn new<T: AnyValue>(value: T, kind: ValueKind) -> Self {
        Self {
            inner: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind,
        }
    }

    /// Wraps a domain object.
    pub fn object<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::Object)
    }

    /// Wraps a scalar value.
    pub fn simple<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::Simple)
    }

    /// Wraps a list or set.
    pub fn collection<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::Collection)
    }

    /// Wraps a key/value map.
    pub fn map<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::Map)
    }

    /// Wraps a fixed-size array.
    pub fn array<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::Array)
    }

    /// Wraps a binding result companion.
    pub fn binding_result<T: AnyValue>(value: T) -> Self {
        Self::new(value, ValueKind::BindingResult)
    }

    /// Returns the `TypeId` of the wrapped value.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the kind of the wrapped value.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Returns `true` if the wrapped value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrows the wrapped value as a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Clones the wrapped value out as a `T`.
    pub fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Returns `true` if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Derives the conventional attribute name for this value.
    pub fn conventional_name(&self) -> String {
        conventions::variable_name(self.type_name)
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::simple(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::simple(value.to_string())
    }
}

macro_rules! impl_simple_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    Self::simple(value)
                }
            }
        )*
    };
}

impl_simple_from!(bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl<T: AnyValue> From<Vec<T>> for AttrValue {
    fn from(value: Vec<T>) -> Self {
        Self::collection(value)
    }
}

impl<K: AnyValue, V: AnyValue> From<HashMap<K, V>> for AttrValue {
    fn from(value: HashMap<K, V>) -> Self {
        Self::map(value)
    }
}

impl<K: AnyValue, V: AnyValue> From<BTreeMap<K, V>> for AttrValue {
    fn from(value: BTreeMap<K, V>) -> Self {
        Self::map(value)
    }
}

/// Naming conventions for attributes derived from types.
pub mod conventions {
    const COLLECTIONS: &[&str] = &["Vec", "VecDeque", "HashSet", "BTreeSet", "LinkedList"];

    /// Derives an attribute name from a Rust type name.
    ///
    /// The module path is dropped and the first letter lowered. Collections
    /// and arrays are named after their element type with a `List` suffix.
    ///
    /// ```
    /// use sluice_core::conventions::variable_name;
    ///
    /// assert_eq!(variable_name("shop::UserProfile"), "userProfile");
    /// assert_eq!(variable_name("alloc::vec::Vec<shop::Book>"), "bookList");
    /// assert_eq!(variable_name("[u8; 4]"), "u8List");
    /// ```
    pub fn variable_name(type_name: &str) -> String {
        let type_name = type_name.trim().trim_start_matches('&');

        if let Some(inner) = type_name.strip_prefix('[') {
            let element = inner
                .trim_end_matches(']')
                .split(';')
                .next()
                .unwrap_or_default();
            return format!("{}List", variable_name(element));
        }

        let (outer, generics) = match type_name.find('<') {
            Some(pos) => (&type_name[..pos], Some(&type_name[pos + 1..])),
            None => (type_name, None),
        };
        let short = short_name(outer);

        if let Some(generics) = generics
            && COLLECTIONS.contains(&short)
        {
            let element = generics.strip_suffix('>').unwrap_or(generics);
            return format!("{}List", variable_name(element));
        }

        decapitalize(short)
    }

    fn short_name(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }

    /// Lowers the first character unless the first two are both uppercase.
    fn decapitalize(name: &str) -> String {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
                name.to_string()
            }
            (Some(first), _) => first.to_lowercase().chain(name.chars().skip(1)).collect(),
            (None, _) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::conventions::variable_name;
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct UserProfile {
        name: String,
    }

    #[test]
    fn test_downcast_and_kind() {
        let value = AttrValue::object(UserProfile {
            name: "ada".into(),
        });

        assert!(value.is::<UserProfile>());
        assert_eq!(value.kind(), ValueKind::Object);
        assert_eq!(
            value.downcast::<UserProfile>().map(|p| p.name),
            Some("ada".to_string())
        );
        assert!(value.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_from_impls_classify_values() {
        assert_eq!(AttrValue::from("x").kind(), ValueKind::Simple);
        assert_eq!(AttrValue::from(42u64).kind(), ValueKind::Simple);
        assert_eq!(AttrValue::from(vec![1, 2]).kind(), ValueKind::Collection);
        assert_eq!(
            AttrValue::from(HashMap::<String, i32>::new()).kind(),
            ValueKind::Map
        );
        assert!(ValueKind::Map.is_plain());
        assert!(!ValueKind::Object.is_plain());
    }

    #[test]
    fn test_clones_share_allocation() {
        let a = AttrValue::from("shared");
        let b = a.clone();
        let c = AttrValue::from("shared");

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_debug_passthrough() {
        let value = AttrValue::from(7i32);
        assert_eq!(format!("{value:?}"), "7");
    }

    #[test]
    fn test_variable_names() {
        assert_eq!(variable_name("UserProfile"), "userProfile");
        assert_eq!(variable_name("my_app::model::UserProfile"), "userProfile");
        assert_eq!(variable_name("alloc::string::String"), "string");
        assert_eq!(variable_name("URL"), "URL");
        assert_eq!(
            variable_name("alloc::vec::Vec<my_app::model::UserProfile>"),
            "userProfileList"
        );
        assert_eq!(
            variable_name("std::collections::hash::map::HashMap<alloc::string::String, i32>"),
            "hashMap"
        );
        assert_eq!(
            AttrValue::object(UserProfile { name: String::new() }).conventional_name(),
            "userProfile"
        );
    }
}
