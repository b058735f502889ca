//! Ordered model attribute map.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sluice_core::AttrValue;

/// An insertion-ordered map of named model attributes.
///
/// `ModelMap` is a handle: clones share the same storage, which lets a
/// handler receive the live model as an argument and contribute to it.
#[derive(Clone, Default)]
pub struct ModelMap {
    entries: Arc<RwLock<Vec<(String, AttrValue)>>>,
}

impl ModelMap {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, replacing a previous value in place.
    pub fn add_attribute(&self, name: impl Into<String>, value: AttrValue) -> &Self {
        let name = name.into();
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => entries.push((name, value)),
        }
        self
    }

    /// Adds an attribute under its conventional name.
    pub fn add_value(&self, value: AttrValue) -> &Self {
        self.add_attribute(value.conventional_name(), value)
    }

    /// Adds all attributes, replacing existing ones.
    pub fn add_all_attributes<I>(&self, attributes: I) -> &Self
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        for (name, value) in attributes {
            self.add_attribute(name, value);
        }
        self
    }

    /// Adds attributes that are not present yet.
    pub fn merge_attributes<I>(&self, attributes: I) -> &Self
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        for (name, value) in attributes {
            if !self.contains(&name) {
                self.add_attribute(name, value);
            }
        }
        self
    }

    /// Returns `true` if the attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|(n, _)| n == name)
    }

    /// Returns an attribute.
    pub fn get(&self, name: &str) -> Option<AttrValue> {
        self.entries
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Returns an attribute downcast to `T`.
    pub fn get_as<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.downcast::<T>())
    }

    /// Removes an attribute.
    pub fn remove(&self, name: &str) -> Option<AttrValue> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|(n, _)| n == name)?;
        Some(entries.remove(pos).1)
    }

    /// Removes every attribute.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns the attribute names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns a copy of all entries in insertion order.
    pub fn snapshot(&self) -> Vec<(String, AttrValue)> {
        self.entries.read().clone()
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the model is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if both handles share the same storage.
    pub fn ptr_eq(&self, other: &ModelMap) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for ModelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.read().iter().map(|(n, v)| (n, v)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_and_replace() {
        let model = ModelMap::new();
        model
            .add_attribute("b", AttrValue::from(1))
            .add_attribute("a", AttrValue::from(2))
            .add_attribute("b", AttrValue::from(3));

        assert_eq!(model.names(), vec!["b", "a"]);
        assert_eq!(model.get_as::<i32>("b"), Some(3));
    }

    #[test]
    fn test_merge_keeps_existing() {
        let model = ModelMap::new();
        model.add_attribute("a", AttrValue::from("first"));
        model.merge_attributes(vec![
            ("a".to_string(), AttrValue::from("second")),
            ("b".to_string(), AttrValue::from("new")),
        ]);

        assert_eq!(model.get_as::<String>("a").as_deref(), Some("first"));
        assert!(model.contains("b"));
    }

    #[test]
    fn test_handles_share_storage() {
        let model = ModelMap::new();
        let handle = model.clone();
        handle.add_value(AttrValue::from(String::from("x")));

        assert!(model.contains("string"));
        assert!(model.ptr_eq(&handle));
        assert!(!model.ptr_eq(&ModelMap::new()));
        assert_eq!(model.remove("string").and_then(|v| v.downcast::<String>()).as_deref(), Some("x"));
        assert!(model.is_empty());
    }
}
