//! Handler lookup by name.
//!
//! The pipeline does not own handler instances. When a route is registered
//! by name, the instance is obtained from a [`HandlerLookup`], which is the
//! seam to whatever container manages handler lifecycles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::foundation::error::{LookupError, LookupResult};

/// Supplies handler instances by name.
pub trait HandlerLookup<H: ?Sized>: Send + Sync {
    /// Returns the handler registered under `name`.
    fn lookup(&self, name: &str) -> LookupResult<Arc<H>>;

    /// Returns `true` if every lookup of `name` yields the same instance.
    ///
    /// Unknown names are reported as singletons; the subsequent lookup
    /// surfaces the error.
    fn is_singleton(&self, _name: &str) -> bool {
        true
    }

    /// Returns `true` if `name` is known.
    fn contains(&self, name: &str) -> bool;
}

type Factory<H> = Arc<dyn Fn() -> Arc<H> + Send + Sync>;

enum Registration<H: ?Sized> {
    Singleton(Arc<H>),
    Prototype(Factory<H>),
}

/// A lookup backed by an in-memory registry.
///
/// Singletons are returned as-is; prototypes call their factory on every
/// lookup, so each caller receives a fresh instance.
pub struct StaticHandlerLookup<H: ?Sized> {
    entries: RwLock<HashMap<String, Registration<H>>>,
}

impl<H: ?Sized> Default for StaticHandlerLookup<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<H: ?Sized + Send + Sync + 'static> StaticHandlerLookup<H> {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared instance.
    pub fn singleton(self, name: impl Into<String>, handler: Arc<H>) -> Self {
        self.entries
            .write()
            .insert(name.into(), Registration::Singleton(handler));
        self
    }

    /// Registers a factory producing a new instance per lookup.
    pub fn prototype<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<H> + Send + Sync + 'static,
    {
        self.entries
            .write()
            .insert(name.into(), Registration::Prototype(Arc::new(factory)));
        self
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<H: ?Sized + Send + Sync + 'static> HandlerLookup<H> for StaticHandlerLookup<H> {
    fn lookup(&self, name: &str) -> LookupResult<Arc<H>> {
        let entries = self.entries.read();
        match entries.get(name) {
            Some(Registration::Singleton(handler)) => Ok(handler.clone()),
            Some(Registration::Prototype(factory)) => {
                trace!(handler = name, "Creating prototype handler instance");
                Ok(factory())
            }
            None => Err(LookupError::not_found(name)),
        }
    }

    fn is_singleton(&self, name: &str) -> bool {
        !matches!(
            self.entries.read().get(name),
            Some(Registration::Prototype(_))
        )
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }
}
