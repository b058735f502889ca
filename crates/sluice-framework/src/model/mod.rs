//! The request model and session-managed attributes.
//!
//! - [`ModelMap`]: insertion-ordered named attributes, shared by handle
//! - [`ModelAndViewContainer`]: per-request model and view decisions
//! - [`SessionAttributesHandler`]: which attributes live in the session
//! - [`ModelFactory`]: populates the model before a handler runs (session
//!   attributes, then model methods in dependency order) and persists it
//!   afterwards (session store or cleanup, then binding results)

pub mod binding;
pub mod container;
pub mod factory;
pub mod map;
pub mod session;

pub use binding::{
    BINDING_RESULT_PREFIX, BindingResult, BindingResultFactory, DefaultBindingResultFactory,
    binding_result_key,
};
pub use container::{
    ModelAndView, ModelAndViewContainer, REDIRECT_URL_PREFIX, SessionStatus, ViewReference,
};
pub use factory::{ModelFactory, ModelMethod};
pub use map::ModelMap;
pub use session::{SessionAttributes, SessionAttributesHandler};
