//! Selecting a view by the media types a request accepts.

use std::sync::Arc;

use sluice_core::{AttrValue, MediaType, WebRequest, attributes};
use tracing::{debug, trace};

use super::manager::ContentNegotiationManager;
use super::resolver::{HIGHEST_PRECEDENCE, ViewResolver, sort_resolvers};
use super::view::{BoxedView, NotAcceptableView};
use crate::error::NegotiationError;

/// Outcome of content negotiation.
#[derive(Debug, Clone)]
pub enum NegotiationResult {
    /// A view matched.
    Selected(BoxedView),
    /// No view matched and the 406 sentinel is enabled.
    NotAcceptable,
    /// No view matched; other resolvers may be tried.
    NoView,
}

/// Delegates to other view resolvers and picks the candidate whose content
/// type best matches the request.
///
/// Candidates are collected from every delegate (the bare view name, then
/// the name with each file extension registered for each requested media
/// type) followed by the default views. A redirect candidate always wins;
/// otherwise requested media types are tried in order of specificity and
/// quality, and the first candidate with a compatible content type is
/// selected.
pub struct ContentNegotiatingViewResolver {
    manager: ContentNegotiationManager,
    view_resolvers: Vec<Arc<dyn ViewResolver>>,
    default_views: Vec<BoxedView>,
    use_not_acceptable_status: bool,
}

impl ContentNegotiatingViewResolver {
    /// Creates a resolver without delegates.
    pub fn new(manager: ContentNegotiationManager) -> Self {
        Self {
            manager,
            view_resolvers: Vec::new(),
            default_views: Vec::new(),
            use_not_acceptable_status: false,
        }
    }

    /// Adds a delegate resolver; delegates are kept sorted by order.
    pub fn with_view_resolver(mut self, resolver: Arc<dyn ViewResolver>) -> Self {
        self.view_resolvers.push(resolver);
        sort_resolvers(&mut self.view_resolvers);
        self
    }

    /// Appends a view considered after the resolved candidates.
    pub fn with_default_view(mut self, view: BoxedView) -> Self {
        self.default_views.push(view);
        self
    }

    /// Returns [`NegotiationResult::NotAcceptable`] instead of
    /// [`NegotiationResult::NoView`] when nothing matches.
    pub fn use_not_acceptable_status(mut self, enabled: bool) -> Self {
        self.use_not_acceptable_status = enabled;
        self
    }

    /// Returns the content negotiation manager.
    pub fn manager(&self) -> &ContentNegotiationManager {
        &self.manager
    }

    /// Negotiates a view for `view_name`.
    pub fn negotiate(
        &self,
        view_name: &str,
        request: &WebRequest,
    ) -> Result<NegotiationResult, NegotiationError> {
        if let Some(requested) = self.media_types(request) {
            let candidates = self.candidate_views(view_name, &requested, request)?;
            if let Some(view) = Self::best_view(&candidates, &requested, request) {
                return Ok(NegotiationResult::Selected(view));
            }
        }

        debug!(view = %view_name, "No acceptable view found");
        if self.use_not_acceptable_status {
            Ok(NegotiationResult::NotAcceptable)
        } else {
            Ok(NegotiationResult::NoView)
        }
    }

    /// Returns the compatible requested/producible pairs, each narrowed to
    /// the more specific side, sorted by specificity and quality.
    ///
    /// Returns `None` if the requested media types cannot be determined.
    pub fn media_types(&self, request: &WebRequest) -> Option<Vec<MediaType>> {
        let acceptable = match self.manager.resolve_media_types(request) {
            Ok(acceptable) => acceptable,
            Err(e) => {
                debug!(error = %e, "Could not resolve requested media types");
                return None;
            }
        };
        let producible = request
            .producible_media_types()
            .unwrap_or_else(|| vec![MediaType::all()]);

        let mut compatible: Vec<MediaType> = Vec::new();
        for accept in &acceptable {
            for produce in &producible {
                if accept.is_compatible_with(produce) {
                    let media_type = MediaType::more_specific(accept, produce);
                    if !compatible.contains(&media_type) {
                        compatible.push(media_type);
                    }
                }
            }
        }

        MediaType::sort_by_specificity_and_quality(&mut compatible);
        trace!(acceptable = ?acceptable, producible = ?producible, selected = ?compatible, "Requested media types");
        Some(compatible)
    }

    fn candidate_views(
        &self,
        view_name: &str,
        requested: &[MediaType],
        request: &WebRequest,
    ) -> Result<Vec<BoxedView>, NegotiationError> {
        let mut candidates = Vec::new();

        for resolver in &self.view_resolvers {
            let resolve = |name: &str| {
                resolver
                    .resolve_view_name(name, request)
                    .map_err(|source| NegotiationError::Resolver {
                        view_name: name.to_string(),
                        source,
                    })
            };

            candidates.extend(resolve(view_name)?);
            for media_type in requested {
                for extension in self.manager.resolve_file_extensions(media_type) {
                    candidates.extend(resolve(&format!("{view_name}.{extension}"))?);
                }
            }
        }

        candidates.extend(self.default_views.iter().cloned());
        Ok(candidates)
    }

    fn best_view(
        candidates: &[BoxedView],
        requested: &[MediaType],
        request: &WebRequest,
    ) -> Option<BoxedView> {
        if let Some(redirect) = candidates.iter().find(|view| view.is_redirect()) {
            return Some(redirect.clone());
        }

        for media_type in requested {
            for candidate in candidates {
                let Some(content_type) = candidate.content_type() else {
                    continue;
                };
                if media_type.is_compatible_with(&content_type) {
                    let selected = media_type.remove_quality_value();
                    trace!(selected = %selected, view = ?candidate, "Selected view");
                    request.set_attribute(
                        attributes::SELECTED_CONTENT_TYPE,
                        AttrValue::simple(selected),
                    );
                    return Some(candidate.clone());
                }
            }
        }
        None
    }
}

impl ViewResolver for ContentNegotiatingViewResolver {
    fn resolve_view_name(
        &self,
        view_name: &str,
        request: &WebRequest,
    ) -> anyhow::Result<Option<BoxedView>> {
        match self.negotiate(view_name, request)? {
            NegotiationResult::Selected(view) => Ok(Some(view)),
            NegotiationResult::NotAcceptable => Ok(Some(Arc::new(NotAcceptableView))),
            NegotiationResult::NoView => Ok(None),
        }
    }

    fn order(&self) -> i32 {
        HIGHEST_PRECEDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::manager::{HeaderStrategy, MediaTypeMappings};
    use crate::negotiation::resolver::MappedViewResolver;
    use crate::negotiation::view::FnView;

    fn typed(media_type: MediaType, name: &str) -> BoxedView {
        FnView::new(media_type, |_, _| Ok(String::new()))
            .named(name)
            .boxed()
    }

    fn view_name_of(view: &BoxedView) -> String {
        format!("{view:?}")
    }

    fn resolver() -> ContentNegotiatingViewResolver {
        let manager = ContentNegotiationManager::new(vec![Arc::new(HeaderStrategy)])
            .with_mappings(MediaTypeMappings::common());
        let html = MappedViewResolver::new()
            .with_view("books", typed(MediaType::text_html(), "books-html"))
            .with_view("books.json", typed(MediaType::application_json(), "books-json"));
        ContentNegotiatingViewResolver::new(manager).with_view_resolver(Arc::new(html))
    }

    #[test]
    fn test_compatibility_beats_quality() {
        let request = WebRequest::builder("/books")
            .accept("application/json;q=1.0, text/html;q=0.8")
            .build();
        request.set_producible_media_types(vec![MediaType::text_html()]);

        let result = resolver().negotiate("books", &request).unwrap();
        let NegotiationResult::Selected(view) = result else {
            panic!("expected a selected view");
        };
        assert!(view_name_of(&view).contains("books-html"));
        assert_eq!(request.selected_content_type(), Some(MediaType::text_html()));
    }

    #[test]
    fn test_extension_candidates() {
        let request = WebRequest::builder("/books").accept("application/json").build();
        let NegotiationResult::Selected(view) = resolver().negotiate("books", &request).unwrap() else {
            panic!("expected a selected view");
        };
        assert!(view_name_of(&view).contains("books-json"));
    }

    #[test]
    fn test_redirect_wins() {
        let request = WebRequest::builder("/books").accept("application/json").build();
        let NegotiationResult::Selected(view) =
            resolver().negotiate("redirect:/books", &request).unwrap()
        else {
            panic!("expected a selected view");
        };
        assert!(view.is_redirect());
    }

    #[test]
    fn test_not_acceptable_or_no_view() {
        let request = WebRequest::builder("/books").accept("image/png").build();
        assert!(matches!(
            resolver().negotiate("books", &request).unwrap(),
            NegotiationResult::NoView
        ));
        assert!(matches!(
            resolver()
                .use_not_acceptable_status(true)
                .negotiate("books", &request)
                .unwrap(),
            NegotiationResult::NotAcceptable
        ));
    }

    #[test]
    fn test_default_views_and_untyped_candidates() {
        let manager = ContentNegotiationManager::default();
        let untyped = MappedViewResolver::new().with_view(
            "books",
            FnView::untyped("untyped", |_, _| Ok(String::new())).boxed(),
        );
        let resolver = ContentNegotiatingViewResolver::new(manager)
            .with_view_resolver(Arc::new(untyped))
            .with_default_view(typed(MediaType::application_json(), "default-json"));

        let request = WebRequest::builder("/books").accept("application/json").build();
        let NegotiationResult::Selected(view) = resolver.negotiate("books", &request).unwrap() else {
            panic!("expected a selected view");
        };
        assert!(view_name_of(&view).contains("default-json"));
    }

    #[test]
    fn test_invalid_accept_header_is_not_acceptable() {
        let request = WebRequest::builder("/books").accept("not a media type").build();
        let resolver = resolver().use_not_acceptable_status(true);
        let view = resolver.resolve_view_name("books", &request).unwrap().unwrap();
        assert!(format!("{view:?}").contains("NotAcceptableView"));
    }
}
