//! URL pattern registry and handler resolution.
//!
//! [`UrlHandlerMapping`] maps URL patterns to handlers. Registration
//! publishes a new route table snapshot, so concurrent lookups never
//! observe a half-updated table and never block on writers.
//!
//! # Resolution
//!
//! For a lookup path the mapping tries, in order:
//!
//! 1. an exact pattern equal to the path;
//! 2. every pattern matching the path (and `pattern/` when trailing slash
//!    matching is enabled), ranked by the path matcher's comparator;
//! 3. the root handler (only for `/`), then the default handler.
//!
//! The winning pattern, the path within it, and the URI template variables
//! of all equally ranked patterns are exposed as request attributes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use sluice_core::{AntPathMatcher, AttrValue, HandlerLookup, PathMatcher, WebRequest, attributes};
use tracing::{debug, trace};

use crate::error::{MappingError, MappingResult};

const ROOT_PATTERN: &str = "/";
const DEFAULT_PATTERN: &str = "/*";

// =============================================================================
// Handler References
// =============================================================================

/// A handler as given at registration time.
pub enum HandlerRef<H: ?Sized> {
    /// A handler instance.
    Resolved(Arc<H>),
    /// A handler name, materialized through the configured [`HandlerLookup`].
    Deferred(String),
}

impl<H: ?Sized> HandlerRef<H> {
    /// Creates a reference to a named handler.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Deferred(name.into())
    }
}

impl<H: ?Sized> Clone for HandlerRef<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Resolved(handler) => Self::Resolved(handler.clone()),
            Self::Deferred(name) => Self::Deferred(name.clone()),
        }
    }
}

impl<H: ?Sized + fmt::Debug> fmt::Debug for HandlerRef<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(handler) => f.debug_tuple("Resolved").field(&handler).finish(),
            Self::Deferred(name) => f.debug_tuple("Deferred").field(name).finish(),
        }
    }
}

impl<H> From<Arc<H>> for HandlerRef<H> {
    fn from(handler: Arc<H>) -> Self {
        Self::Resolved(handler)
    }
}

enum Slot<H: ?Sized> {
    Resolved(Arc<H>),
    Deferred {
        name: String,
        cache: Arc<OnceCell<Arc<H>>>,
    },
}

impl<H: ?Sized> Clone for Slot<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Resolved(handler) => Self::Resolved(handler.clone()),
            Self::Deferred { name, cache } => Self::Deferred {
                name: name.clone(),
                cache: cache.clone(),
            },
        }
    }
}

impl<H: ?Sized + fmt::Debug> Slot<H> {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resolved(a), Self::Resolved(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Deferred { name: a, .. }, Self::Deferred { name: b, .. }) => a == b,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Resolved(handler) => format!("{handler:?}"),
            Self::Deferred { name, .. } => format!("'{name}'"),
        }
    }

    fn as_ref(&self) -> HandlerRef<H> {
        match self {
            Self::Resolved(handler) => HandlerRef::Resolved(handler.clone()),
            Self::Deferred { name, .. } => HandlerRef::Deferred(name.clone()),
        }
    }
}

struct RouteTable<H: ?Sized> {
    /// Patterns in registration order.
    patterns: Vec<String>,
    handlers: HashMap<String, Slot<H>>,
    root: Option<Slot<H>>,
    default: Option<Slot<H>>,
}

impl<H: ?Sized> RouteTable<H> {
    fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            handlers: HashMap::new(),
            root: None,
            default: None,
        }
    }

    fn slot(&self, pattern: &str) -> Option<&Slot<H>> {
        match pattern {
            ROOT_PATTERN => self.root.as_ref(),
            DEFAULT_PATTERN => self.default.as_ref(),
            _ => self.handlers.get(pattern),
        }
    }
}

impl<H: ?Sized> Clone for RouteTable<H> {
    fn clone(&self) -> Self {
        Self {
            patterns: self.patterns.clone(),
            handlers: self.handlers.clone(),
            root: self.root.clone(),
            default: self.default.clone(),
        }
    }
}

// =============================================================================
// Resolution Results
// =============================================================================

/// A handler selected for a request.
#[derive(Debug)]
pub struct HandlerMatch<H: ?Sized> {
    /// The handler instance.
    pub handler: Arc<H>,
    /// The pattern that won; the lookup path itself for exact and fallback matches.
    pub best_pattern: String,
    /// The part of the path matched by wildcards of the best pattern.
    pub path_within_mapping: String,
    /// Variables of every pattern ranked equal to the best one.
    pub uri_template_variables: HashMap<String, String>,
}

/// Outcome of [`UrlHandlerMapping::resolve`].
#[derive(Debug)]
pub enum Resolution<H: ?Sized> {
    /// A handler was found.
    Found(HandlerMatch<H>),
    /// Nothing matched and no root or default handler applies.
    NotFound,
}

impl<H: ?Sized> Resolution<H> {
    /// Returns `true` if a handler was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Returns the match, if any.
    pub fn into_match(self) -> Option<HandlerMatch<H>> {
        match self {
            Self::Found(found) => Some(found),
            Self::NotFound => None,
        }
    }
}

/// A single pattern matched against a request's lookup path.
pub struct RequestMatchResult {
    pattern: String,
    lookup_path: String,
    matcher: Arc<dyn PathMatcher>,
}

impl RequestMatchResult {
    /// Returns the matched pattern, with a trailing `/` if it was appended.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the lookup path.
    pub fn lookup_path(&self) -> &str {
        &self.lookup_path
    }

    /// Extracts the URI template variables of the match.
    pub fn extract_uri_template_variables(&self) -> HashMap<String, String> {
        self.matcher
            .extract_uri_template_variables(&self.pattern, &self.lookup_path)
            .unwrap_or_default()
    }
}

impl fmt::Debug for RequestMatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMatchResult")
            .field("pattern", &self.pattern)
            .field("lookup_path", &self.lookup_path)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// UrlHandlerMapping
// =============================================================================

/// Maps URL patterns to handlers of type `H`.
pub struct UrlHandlerMapping<H: ?Sized> {
    table: ArcSwap<RouteTable<H>>,
    write_lock: Mutex<()>,
    path_matcher: Arc<dyn PathMatcher>,
    lookup: Option<Arc<dyn HandlerLookup<H>>>,
    use_trailing_slash_match: bool,
    lazy_init_handlers: bool,
}

impl<H: ?Sized + fmt::Debug + Send + Sync + 'static> UrlHandlerMapping<H> {
    /// Creates an empty mapping using an [`AntPathMatcher`].
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::empty()),
            write_lock: Mutex::new(()),
            path_matcher: Arc::new(AntPathMatcher::new()),
            lookup: None,
            use_trailing_slash_match: false,
            lazy_init_handlers: false,
        }
    }

    /// Sets the lookup used to materialize handlers registered by name.
    pub fn with_lookup(mut self, lookup: Arc<dyn HandlerLookup<H>>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Replaces the path matcher.
    pub fn with_path_matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.path_matcher = matcher;
        self
    }

    /// Lets `/users` also match `/users/`.
    pub fn use_trailing_slash_match(mut self, enabled: bool) -> Self {
        self.use_trailing_slash_match = enabled;
        self
    }

    /// Defers materializing named singletons until first resolution.
    pub fn lazy_init_handlers(mut self, enabled: bool) -> Self {
        self.lazy_init_handlers = enabled;
        self
    }

    /// Returns the path matcher.
    pub fn path_matcher(&self) -> &Arc<dyn PathMatcher> {
        &self.path_matcher
    }

    // ─── Registration ───

    /// Registers a handler instance under `pattern`.
    pub fn register(&self, pattern: impl Into<String>, handler: Arc<H>) -> MappingResult<()> {
        self.register_handler(pattern, HandlerRef::Resolved(handler))
    }

    /// Registers a named handler under `pattern`.
    pub fn register_named(
        &self,
        pattern: impl Into<String>,
        name: impl Into<String>,
    ) -> MappingResult<()> {
        self.register_handler(pattern, HandlerRef::Deferred(name.into()))
    }

    /// Registers `handler` under each of `patterns`. Nothing is registered
    /// if any pattern conflicts.
    pub fn register_all<I, S>(&self, patterns: I, handler: HandlerRef<H>) -> MappingResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_batch(
            patterns
                .into_iter()
                .map(|pattern| (pattern.into(), handler.clone()))
                .collect(),
        )
    }

    /// Registers each resolved handler under its pattern. Nothing is
    /// registered if any pattern conflicts.
    pub fn register_routes<I, S>(&self, routes: I) -> MappingResult<()>
    where
        I: IntoIterator<Item = (S, Arc<H>)>,
        S: Into<String>,
    {
        self.register_batch(
            routes
                .into_iter()
                .map(|(pattern, handler)| (pattern.into(), HandlerRef::Resolved(handler)))
                .collect(),
        )
    }

    /// Registers a handler under `pattern`.
    ///
    /// `/` sets the root handler and `/*` the default handler. Registering
    /// the same handler again under a pattern is a no-op; a different
    /// handler is a [`MappingError::ConfigurationConflict`].
    ///
    /// Named singletons are materialized here unless lazy initialization is
    /// enabled.
    pub fn register_handler(
        &self,
        pattern: impl Into<String>,
        handler: HandlerRef<H>,
    ) -> MappingResult<()> {
        self.register_batch(vec![(pattern.into(), handler)])
    }

    /// Checks every entry against the table and against each other, then
    /// publishes them with a single swap.
    fn register_batch(&self, entries: Vec<(String, HandlerRef<H>)>) -> MappingResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.table.load();
        let mut next = RouteTable::clone(&current);
        let mut added = Vec::new();

        for (pattern, handler) in entries {
            let slot = self.make_slot(&pattern, handler)?;
            if let Some(existing) = next.slot(&pattern) {
                if existing.same_as(&slot) {
                    trace!(pattern = %pattern, "Handler already mapped");
                    continue;
                }
                return Err(MappingError::ConfigurationConflict {
                    pattern,
                    handler: slot.describe(),
                    existing: existing.describe(),
                });
            }

            added.push((pattern.clone(), slot.describe()));
            match pattern.as_str() {
                ROOT_PATTERN => next.root = Some(slot),
                DEFAULT_PATTERN => next.default = Some(slot),
                _ => {
                    next.patterns.push(pattern.clone());
                    next.handlers.insert(pattern.clone(), slot);
                }
            }
        }

        if added.is_empty() {
            return Ok(());
        }
        self.table.store(Arc::new(next));
        for (pattern, handler) in added {
            debug!(pattern = %pattern, handler = %handler, "Mapped URL path");
        }
        Ok(())
    }

    fn make_slot(&self, pattern: &str, handler: HandlerRef<H>) -> MappingResult<Slot<H>> {
        match handler {
            HandlerRef::Resolved(handler) => Ok(Slot::Resolved(handler)),
            HandlerRef::Deferred(name) => {
                if self.lazy_init_handlers {
                    return Ok(Slot::Deferred {
                        name,
                        cache: Arc::new(OnceCell::new()),
                    });
                }
                let lookup = self.lookup_for(&name)?;
                if lookup.is_singleton(&name) {
                    let handler =
                        lookup
                            .lookup(&name)
                            .map_err(|source| MappingError::Lookup {
                                pattern: pattern.to_string(),
                                source,
                            })?;
                    Ok(Slot::Resolved(handler))
                } else {
                    Ok(Slot::Deferred {
                        name,
                        cache: Arc::new(OnceCell::new()),
                    })
                }
            }
        }
    }

    fn lookup_for(&self, name: &str) -> MappingResult<&Arc<dyn HandlerLookup<H>>> {
        self.lookup.as_ref().ok_or_else(|| MappingError::NoLookup {
            name: name.to_string(),
        })
    }

    fn materialize(&self, pattern: &str, slot: &Slot<H>) -> MappingResult<Arc<H>> {
        let (name, cache) = match slot {
            Slot::Resolved(handler) => return Ok(handler.clone()),
            Slot::Deferred { name, cache } => (name, cache),
        };
        let lookup = self.lookup_for(name)?;
        let to_error = |source| MappingError::Lookup {
            pattern: pattern.to_string(),
            source,
        };
        if lookup.is_singleton(name) {
            cache
                .get_or_try_init(|| lookup.lookup(name))
                .cloned()
                .map_err(to_error)
        } else {
            lookup.lookup(name).map_err(to_error)
        }
    }

    // ─── Resolution ───

    /// Resolves the handler for `request` and exposes the match as request
    /// attributes.
    pub fn resolve(&self, request: &WebRequest) -> MappingResult<Resolution<H>> {
        let table = self.table.load();
        let lookup_path = request.path();

        let found = match self.lookup_handler(&table, lookup_path)? {
            Some(found) => Some(found),
            None => self.fallback_handler(&table, lookup_path)?,
        };

        let Some(found) = found else {
            trace!(path = %lookup_path, "No handler mapping");
            return Ok(Resolution::NotFound);
        };

        expose_match(request, &found);
        debug!(path = %lookup_path, pattern = %found.best_pattern, handler = ?found.handler, "Mapped to handler");
        Ok(Resolution::Found(found))
    }

    fn lookup_handler(
        &self,
        table: &RouteTable<H>,
        lookup_path: &str,
    ) -> MappingResult<Option<HandlerMatch<H>>> {
        if let Some(slot) = table.handlers.get(lookup_path) {
            let handler = self.materialize(lookup_path, slot)?;
            return Ok(Some(HandlerMatch {
                handler,
                best_pattern: lookup_path.to_string(),
                path_within_mapping: lookup_path.to_string(),
                uri_template_variables: HashMap::new(),
            }));
        }

        let matcher = &self.path_matcher;
        let mut matching: Vec<String> = Vec::new();
        for pattern in &table.patterns {
            if matcher.matches(pattern, lookup_path) {
                matching.push(pattern.clone());
            } else if self.use_trailing_slash_match && !pattern.ends_with('/') {
                let with_slash = format!("{pattern}/");
                if matcher.matches(&with_slash, lookup_path) {
                    matching.push(with_slash);
                }
            }
        }

        let comparator = matcher.pattern_comparator(lookup_path);
        matching.sort_by(|a, b| comparator(a, b));
        let Some(best) = matching.first() else {
            return Ok(None);
        };
        trace!(path = %lookup_path, patterns = ?matching, "Matching patterns");

        let registered = match table.handlers.get(best.as_str()) {
            Some(slot) => Some((best.as_str(), slot)),
            None => best
                .strip_suffix('/')
                .and_then(|stripped| table.handlers.get(stripped).map(|slot| (stripped, slot))),
        };
        let Some((registered, slot)) = registered else {
            return Ok(None);
        };
        let handler = self.materialize(registered, slot)?;

        let path_within_mapping = matcher.extract_path_within_pattern(best, lookup_path);
        let mut uri_template_variables = HashMap::new();
        for pattern in &matching {
            if comparator(best, pattern).is_eq()
                && let Some(vars) = matcher.extract_uri_template_variables(pattern, lookup_path)
            {
                uri_template_variables.extend(vars);
            }
        }

        Ok(Some(HandlerMatch {
            handler,
            best_pattern: best.clone(),
            path_within_mapping,
            uri_template_variables,
        }))
    }

    fn fallback_handler(
        &self,
        table: &RouteTable<H>,
        lookup_path: &str,
    ) -> MappingResult<Option<HandlerMatch<H>>> {
        let fallback = if lookup_path == ROOT_PATTERN {
            table.root.as_ref().map(|slot| (ROOT_PATTERN, slot))
        } else {
            None
        }
        .or_else(|| table.default.as_ref().map(|slot| (DEFAULT_PATTERN, slot)));

        let Some((pattern, slot)) = fallback else {
            return Ok(None);
        };
        let handler = self.materialize(pattern, slot)?;
        Ok(Some(HandlerMatch {
            handler,
            best_pattern: lookup_path.to_string(),
            path_within_mapping: lookup_path.to_string(),
            uri_template_variables: HashMap::new(),
        }))
    }

    /// Matches a single `pattern` against the request's lookup path.
    pub fn matches(&self, request: &WebRequest, pattern: &str) -> Option<RequestMatchResult> {
        let lookup_path = request.path();
        let matched = if self.path_matcher.matches(pattern, lookup_path) {
            pattern.to_string()
        } else if self.use_trailing_slash_match && !pattern.ends_with('/') {
            let with_slash = format!("{pattern}/");
            if !self.path_matcher.matches(&with_slash, lookup_path) {
                return None;
            }
            with_slash
        } else {
            return None;
        };
        Some(RequestMatchResult {
            pattern: matched,
            lookup_path: lookup_path.to_string(),
            matcher: self.path_matcher.clone(),
        })
    }

    // ─── Introspection ───

    /// Returns the registered patterns and handlers in registration order,
    /// excluding the root and default handlers.
    pub fn handler_map(&self) -> Vec<(String, HandlerRef<H>)> {
        let table = self.table.load();
        table
            .patterns
            .iter()
            .filter_map(|pattern| {
                table
                    .handlers
                    .get(pattern)
                    .map(|slot| (pattern.clone(), slot.as_ref()))
            })
            .collect()
    }

    /// Returns the handler registered for `/`.
    pub fn root_handler(&self) -> Option<HandlerRef<H>> {
        self.table.load().root.as_ref().map(Slot::as_ref)
    }

    /// Returns the handler registered for `/*`.
    pub fn default_handler(&self) -> Option<HandlerRef<H>> {
        self.table.load().default.as_ref().map(Slot::as_ref)
    }

    /// Returns the number of registered patterns, excluding root and default.
    pub fn len(&self) -> usize {
        self.table.load().patterns.len()
    }

    /// Returns `true` if no pattern is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: ?Sized + fmt::Debug + Send + Sync + 'static> Default for UrlHandlerMapping<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for UrlHandlerMapping<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.load();
        f.debug_struct("UrlHandlerMapping")
            .field("patterns", &table.patterns)
            .field("root", &table.root.is_some())
            .field("default", &table.default.is_some())
            .field("use_trailing_slash_match", &self.use_trailing_slash_match)
            .field("lazy_init_handlers", &self.lazy_init_handlers)
            .finish_non_exhaustive()
    }
}

fn expose_match<H: ?Sized>(request: &WebRequest, found: &HandlerMatch<H>) {
    request.set_attribute(
        attributes::BEST_MATCHING_PATTERN,
        AttrValue::simple(found.best_pattern.clone()),
    );
    request.set_attribute(
        attributes::PATH_WITHIN_HANDLER_MAPPING,
        AttrValue::simple(found.path_within_mapping.clone()),
    );
    if !found.uri_template_variables.is_empty() {
        request.set_attribute(
            attributes::URI_TEMPLATE_VARIABLES,
            AttrValue::map(found.uri_template_variables.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sluice_core::StaticHandlerLookup;

    use super::*;

    fn handler(name: &str) -> Arc<String> {
        Arc::new(name.to_string())
    }

    fn resolve_ok(mapping: &UrlHandlerMapping<String>, path: &str) -> (HandlerMatch<String>, WebRequest) {
        let request = WebRequest::new(path);
        let resolution = mapping.resolve(&request).unwrap();
        let Resolution::Found(found) = resolution else {
            panic!("no handler for {path}");
        };
        (found, request)
    }

    #[test]
    fn test_exact_match_beats_patterns() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/books/*", handler("any")).unwrap();
        mapping.register("/books/new", handler("new")).unwrap();

        let (found, request) = resolve_ok(&mapping, "/books/new");
        assert_eq!(*found.handler, "new");
        assert_eq!(found.best_pattern, "/books/new");
        assert_eq!(found.path_within_mapping, "/books/new");
        assert!(request.uri_template_variables().is_empty());
    }

    #[test]
    fn test_most_specific_pattern_wins() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/books/**", handler("all")).unwrap();
        mapping.register("/books/{id}", handler("one")).unwrap();

        let (found, request) = resolve_ok(&mapping, "/books/42");
        assert_eq!(*found.handler, "one");
        assert_eq!(found.best_pattern, "/books/{id}");
        assert_eq!(request.uri_template_variables()["id"], "42");

        let (found, _) = resolve_ok(&mapping, "/books/42/reviews");
        assert_eq!(*found.handler, "all");
        assert_eq!(found.path_within_mapping, "42/reviews");
    }

    #[test]
    fn test_equally_ranked_patterns_share_variables() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/{shelf}/*", handler("first")).unwrap();
        mapping.register("/*/{book}", handler("second")).unwrap();

        let (found, _) = resolve_ok(&mapping, "/fiction/dune");
        assert_eq!(*found.handler, "first");
        assert_eq!(found.uri_template_variables["shelf"], "fiction");
        assert_eq!(found.uri_template_variables["book"], "dune");
    }

    #[test]
    fn test_trailing_slash_match() {
        let mapping = UrlHandlerMapping::new().use_trailing_slash_match(true);
        mapping.register("/users", handler("users")).unwrap();

        let (found, _) = resolve_ok(&mapping, "/users/");
        assert_eq!(*found.handler, "users");
        assert_eq!(found.best_pattern, "/users/");

        let strict = UrlHandlerMapping::new();
        strict.register("/users", handler("users")).unwrap();
        assert!(!strict.resolve(&WebRequest::new("/users/")).unwrap().is_found());
    }

    #[test]
    fn test_trailing_slash_keeps_variables() {
        let mapping = UrlHandlerMapping::new().use_trailing_slash_match(true);
        mapping.register("/books/{id}", handler("book")).unwrap();

        let (plain, plain_request) = resolve_ok(&mapping, "/books/42");
        let (slashed, slashed_request) = resolve_ok(&mapping, "/books/42/");
        assert_eq!(*slashed.handler, "book");
        assert_eq!(plain.best_pattern, "/books/{id}");
        assert_eq!(slashed.best_pattern, "/books/{id}/");
        assert_eq!(slashed.uri_template_variables, plain.uri_template_variables);
        assert_eq!(
            slashed_request.uri_template_variables(),
            plain_request.uri_template_variables()
        );
        assert_eq!(slashed_request.uri_template_variables()["id"], "42");
    }

    #[test]
    fn test_prefix_pattern_beats_inner_double_wildcard() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/**/{id}", handler("wild")).unwrap();
        mapping.register("/books/**", handler("books")).unwrap();

        let (found, _) = resolve_ok(&mapping, "/books/42");
        assert_eq!(*found.handler, "books");
        assert_eq!(found.best_pattern, "/books/**");
    }

    #[test]
    fn test_root_and_default_handlers() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/", handler("root")).unwrap();
        mapping.register("/*", handler("default")).unwrap();
        mapping.register("/books", handler("books")).unwrap();

        assert_eq!(*resolve_ok(&mapping, "/").0.handler, "root");
        let (fallback, request) = resolve_ok(&mapping, "/authors/7");
        assert_eq!(*fallback.handler, "default");
        assert_eq!(fallback.best_pattern, "/authors/7");
        assert!(request.attribute(attributes::BEST_MATCHING_PATTERN).is_some());
        assert_eq!(mapping.len(), 1);
        assert!(mapping.root_handler().is_some());
    }

    #[test]
    fn test_not_found() {
        let mapping = UrlHandlerMapping::<String>::new();
        mapping.register("/books", handler("books")).unwrap();
        assert!(matches!(
            mapping.resolve(&WebRequest::new("/authors")).unwrap(),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_conflicting_registration() {
        let mapping = UrlHandlerMapping::new();
        let books = handler("books");
        mapping.register("/books", books.clone()).unwrap();
        mapping.register("/books", books).unwrap();

        let err = mapping.register("/books", handler("other")).unwrap_err();
        assert!(matches!(err, MappingError::ConfigurationConflict { .. }));
        assert!(err.to_string().contains("/books"));

        mapping.register("/", handler("root")).unwrap();
        assert!(mapping.register("/", handler("again")).is_err());
    }

    #[test]
    fn test_conflicting_batch_registers_nothing() {
        let mapping = UrlHandlerMapping::new();
        mapping.register("/books", handler("books")).unwrap();

        let err = mapping
            .register_routes([
                ("/authors", handler("authors")),
                ("/books", handler("other")),
            ])
            .unwrap_err();
        assert!(matches!(err, MappingError::ConfigurationConflict { .. }));
        assert_eq!(mapping.len(), 1);
        assert!(!mapping.resolve(&WebRequest::new("/authors")).unwrap().is_found());

        mapping
            .register_routes([("/authors", handler("authors")), ("/books/{id}", handler("book"))])
            .unwrap();
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_named_singleton_resolved_eagerly() {
        let lookup = Arc::new(StaticHandlerLookup::new().singleton("books", handler("books")));
        let mapping = UrlHandlerMapping::new().with_lookup(lookup);
        mapping.register_named("/books", "books").unwrap();

        assert!(matches!(mapping.handler_map()[0].1, HandlerRef::Resolved(_)));
        assert!(mapping.register_named("/missing", "missing").is_err());
    }

    #[test]
    fn test_lazy_named_handlers() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let lookup = Arc::new(
            StaticHandlerLookup::new()
                .singleton("books", handler("books"))
                .prototype("cart", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    handler("cart")
                }),
        );
        let mapping = UrlHandlerMapping::new()
            .with_lookup(lookup)
            .lazy_init_handlers(true);
        mapping.register_named("/books", "books").unwrap();
        mapping.register_named("/cart", "cart").unwrap();
        mapping.register_named("/missing", "missing").unwrap();

        let (a, _) = resolve_ok(&mapping, "/books");
        let (b, _) = resolve_ok(&mapping, "/books");
        assert!(Arc::ptr_eq(&a.handler, &b.handler));

        resolve_ok(&mapping, "/cart");
        resolve_ok(&mapping, "/cart");
        assert_eq!(created.load(Ordering::SeqCst), 2);

        let err = mapping.resolve(&WebRequest::new("/missing")).unwrap_err();
        assert!(matches!(err, MappingError::Lookup { .. }));
    }

    #[test]
    fn test_named_handler_without_lookup() {
        let mapping = UrlHandlerMapping::<String>::new();
        let err = mapping.register_named("/books", "books").unwrap_err();
        assert!(matches!(err, MappingError::NoLookup { .. }));
    }

    #[test]
    fn test_match_single_pattern() {
        let mapping = UrlHandlerMapping::<String>::new().use_trailing_slash_match(true);
        let request = WebRequest::new("/books/42/");

        let result = mapping.matches(&request, "/books/{id}").unwrap();
        assert_eq!(result.pattern(), "/books/{id}/");
        assert_eq!(result.extract_uri_template_variables()["id"], "42");
        assert!(mapping.matches(&request, "/authors/{id}").is_none());
    }

    #[test]
    fn test_concurrent_registration_and_lookup() {
        let mapping = Arc::new(UrlHandlerMapping::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let mapping = mapping.clone();
                std::thread::spawn(move || {
                    let pattern = format!("/shelf{i}/{{id}}");
                    mapping.register(pattern, handler(&format!("shelf{i}"))).unwrap();
                    let request = WebRequest::new(format!("/shelf{i}/1"));
                    assert!(mapping.resolve(&request).unwrap().is_found());
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(mapping.len(), 8);
    }
}
