//! View resolvers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sluice_core::WebRequest;

use super::view::{BoxedView, RedirectView};
use crate::model::REDIRECT_URL_PREFIX;

/// Lowest precedence, the default resolver order.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// Highest precedence.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Resolves logical view names to views.
pub trait ViewResolver: Send + Sync {
    /// Resolves `view_name`, returning `None` to let other resolvers try.
    fn resolve_view_name(
        &self,
        view_name: &str,
        request: &WebRequest,
    ) -> anyhow::Result<Option<BoxedView>>;

    /// Precedence among resolvers; lower values come first.
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// Sorts resolvers by [`ViewResolver::order`], keeping registration order for ties.
pub fn sort_resolvers(resolvers: &mut [Arc<dyn ViewResolver>]) {
    resolvers.sort_by_key(|resolver| resolver.order());
}

/// Resolves names from a fixed map.
///
/// Names starting with `redirect:` always resolve to a [`RedirectView`].
pub struct MappedViewResolver {
    views: RwLock<HashMap<String, BoxedView>>,
    order: i32,
}

impl MappedViewResolver {
    /// Creates an empty resolver with the lowest precedence.
    pub fn new() -> Self {
        Self {
            views: RwLock::new(HashMap::new()),
            order: LOWEST_PRECEDENCE,
        }
    }

    /// Registers a view under `name`.
    pub fn with_view(self, name: impl Into<String>, view: BoxedView) -> Self {
        self.add_view(name, view);
        self
    }

    /// Sets the precedence.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Registers a view under `name`, replacing an earlier one.
    pub fn add_view(&self, name: impl Into<String>, view: BoxedView) {
        self.views.write().insert(name.into(), view);
    }
}

impl Default for MappedViewResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewResolver for MappedViewResolver {
    fn resolve_view_name(
        &self,
        view_name: &str,
        _request: &WebRequest,
    ) -> anyhow::Result<Option<BoxedView>> {
        if let Some(url) = view_name.strip_prefix(REDIRECT_URL_PREFIX) {
            return Ok(Some(Arc::new(RedirectView::new(url))));
        }
        Ok(self.views.read().get(view_name).cloned())
    }

    fn order(&self) -> i32 {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use sluice_core::MediaType;

    use super::*;
    use crate::negotiation::view::FnView;

    #[test]
    fn test_mapped_resolver() {
        let resolver = MappedViewResolver::new().with_view(
            "books",
            FnView::new(MediaType::text_html(), |_, _| Ok(String::new())).boxed(),
        );
        let request = WebRequest::new("/");

        assert!(resolver.resolve_view_name("books", &request).unwrap().is_some());
        assert!(resolver.resolve_view_name("authors", &request).unwrap().is_none());

        let redirect = resolver
            .resolve_view_name("redirect:/books", &request)
            .unwrap()
            .unwrap();
        assert!(redirect.is_redirect());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut resolvers: Vec<Arc<dyn ViewResolver>> = vec![
            Arc::new(MappedViewResolver::new().with_view(
                "a",
                FnView::untyped("first", |_, _| Ok(String::new())).boxed(),
            )),
            Arc::new(MappedViewResolver::new().with_order(1)),
            Arc::new(MappedViewResolver::new()),
        ];
        sort_resolvers(&mut resolvers);

        let orders: Vec<i32> = resolvers.iter().map(|r| r.order()).collect();
        assert_eq!(orders, vec![1, LOWEST_PRECEDENCE, LOWEST_PRECEDENCE]);
        assert!(resolvers[1]
            .resolve_view_name("a", &WebRequest::new("/"))
            .unwrap()
            .is_some());
    }
}
