//! Views, view resolution and content negotiation.
//!
//! A handler names a logical view; the [`ContentNegotiatingViewResolver`]
//! asks its delegate [`ViewResolver`]s for candidates and selects the one
//! whose content type suits the media types the request accepts, as
//! determined by the [`ContentNegotiationManager`].

pub mod content_negotiating;
pub mod manager;
pub mod resolver;
pub mod view;

pub use content_negotiating::{ContentNegotiatingViewResolver, NegotiationResult};
pub use manager::{
    ContentNegotiationManager, ContentNegotiationStrategy, FixedStrategy, HeaderStrategy,
    MediaTypeMappings, ParameterStrategy,
};
pub use resolver::{
    HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE, MappedViewResolver, ViewResolver, sort_resolvers,
};
pub use view::{
    BoxedView, FnView, NotAcceptableView, RedirectView, RenderedView, STATUS_FOUND,
    STATUS_NOT_ACCEPTABLE, View,
};
