//! Per-request model and view state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sluice_core::AttrValue;

use crate::model::map::ModelMap;
use crate::negotiation::view::BoxedView;

/// Prefix of view names that request a redirect.
pub const REDIRECT_URL_PREFIX: &str = "redirect:";

/// A view, either by name (resolved later) or as an instance.
#[derive(Clone)]
pub enum ViewReference {
    /// A logical view name.
    Name(String),
    /// A view instance.
    View(BoxedView),
}

impl ViewReference {
    /// Returns the view name, if this is a name reference.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::View(_) => None,
        }
    }

    /// Returns `true` if this reference denotes a redirect.
    pub fn is_redirect(&self) -> bool {
        match self {
            Self::Name(name) => name.starts_with(REDIRECT_URL_PREFIX),
            Self::View(view) => view.is_redirect(),
        }
    }
}

impl fmt::Debug for ViewReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "View name '{name}'"),
            Self::View(view) => write!(f, "View {view:?}"),
        }
    }
}

/// Marks session processing of the current handler as complete.
///
/// Handlers receive this as an argument and call
/// [`set_complete`](Self::set_complete) to have their session attributes
/// cleaned up after the request. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    complete: Arc<AtomicBool>,
}

impl SessionStatus {
    /// Creates a fresh, incomplete status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the session processing as complete.
    pub fn set_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Returns `true` once [`set_complete`](Self::set_complete) was called.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

/// A model and view pair returned by a handler or produced by the adapter.
#[derive(Debug, Clone, Default)]
pub struct ModelAndView {
    view: Option<ViewReference>,
    model: Vec<(String, AttrValue)>,
    status: Option<u16>,
}

impl ModelAndView {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an instance with a view name.
    pub fn with_view_name(name: impl Into<String>) -> Self {
        Self {
            view: Some(ViewReference::Name(name.into())),
            ..Self::default()
        }
    }

    /// Creates an instance with a view instance.
    pub fn with_view(view: BoxedView) -> Self {
        Self {
            view: Some(ViewReference::View(view)),
            ..Self::default()
        }
    }

    /// Adds a model attribute.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.model.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.model.push((name, value)),
        }
        self
    }

    /// Sets the response status.
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the view reference.
    pub fn view(&self) -> Option<&ViewReference> {
        self.view.as_ref()
    }

    /// Replaces the view reference.
    pub fn set_view(&mut self, view: Option<ViewReference>) {
        self.view = view;
    }

    /// Returns the model entries.
    pub fn model(&self) -> &[(String, AttrValue)] {
        &self.model
    }

    /// Returns the model as a [`ModelMap`].
    pub fn model_map(&self) -> ModelMap {
        let map = ModelMap::new();
        map.add_all_attributes(self.model.iter().cloned());
        map
    }

    /// Returns the response status, if set.
    pub fn response_status(&self) -> Option<u16> {
        self.status
    }

    pub(crate) fn into_parts(self) -> (Option<ViewReference>, Vec<(String, AttrValue)>, Option<u16>) {
        (self.view, self.model, self.status)
    }
}

/// Records model and view decisions made while a handler runs.
///
/// Two models exist: the default model and, once a redirect is selected, an
/// optional redirect model. [`model`](Self::model) returns whichever is
/// active.
#[derive(Debug, Default)]
pub struct ModelAndViewContainer {
    ignore_default_model_on_redirect: bool,
    view: Option<ViewReference>,
    default_model: ModelMap,
    redirect_model: Option<ModelMap>,
    redirect_model_scenario: bool,
    status: Option<u16>,
    binding_disabled: HashSet<String>,
    session_status: SessionStatus,
    request_handled: bool,
}

impl ModelAndViewContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Never expose the default model to a redirect, even without a redirect model.
    pub fn set_ignore_default_model_on_redirect(&mut self, ignore: bool) {
        self.ignore_default_model_on_redirect = ignore;
    }

    // ─── View ────────────────────────────────────────────────────────────────

    /// Sets a view name.
    pub fn set_view_name(&mut self, name: impl Into<String>) {
        self.view = Some(ViewReference::Name(name.into()));
    }

    /// Sets a view instance.
    pub fn set_view(&mut self, view: BoxedView) {
        self.view = Some(ViewReference::View(view));
    }

    /// Returns the view name, if the view is a name reference.
    pub fn view_name(&self) -> Option<&str> {
        self.view.as_ref().and_then(ViewReference::name)
    }

    /// Returns the view reference.
    pub fn view(&self) -> Option<&ViewReference> {
        self.view.as_ref()
    }

    /// Replaces the view reference.
    pub fn set_view_reference(&mut self, view: Option<ViewReference>) {
        self.view = view;
    }

    // ─── Model ───────────────────────────────────────────────────────────────

    /// Returns the active model.
    pub fn model(&mut self) -> ModelMap {
        if self.use_default_model() {
            self.default_model.clone()
        } else {
            self.redirect_model.get_or_insert_with(ModelMap::new).clone()
        }
    }

    fn use_default_model(&self) -> bool {
        !self.redirect_model_scenario
            || (self.redirect_model.is_none() && !self.ignore_default_model_on_redirect)
    }

    /// Returns the default model regardless of the redirect scenario.
    pub fn default_model(&self) -> ModelMap {
        self.default_model.clone()
    }

    /// Provides a separate model for redirect scenarios.
    pub fn set_redirect_model(&mut self, model: ModelMap) {
        self.redirect_model = Some(model);
    }

    /// Signals that the handler chose a redirect.
    pub fn set_redirect_model_scenario(&mut self, redirect: bool) {
        self.redirect_model_scenario = redirect;
    }

    /// Returns `true` once a redirect was chosen.
    pub fn is_redirect_model_scenario(&self) -> bool {
        self.redirect_model_scenario
    }

    /// Adds an attribute to the active model.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        self.model().add_attribute(name, value);
    }

    /// Adds attributes to the active model, replacing existing ones.
    pub fn add_all_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        self.model().add_all_attributes(attributes);
    }

    /// Adds attributes not yet present in the active model.
    pub fn merge_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (String, AttrValue)>,
    {
        self.model().merge_attributes(attributes);
    }

    /// Returns `true` if the active model contains the attribute.
    pub fn contains_attribute(&mut self, name: &str) -> bool {
        self.model().contains(name)
    }

    // ─── Binding ─────────────────────────────────────────────────────────────

    /// Disables data binding for the named attribute.
    pub fn set_binding_disabled(&mut self, name: impl Into<String>) {
        self.binding_disabled.insert(name.into());
    }

    /// Returns `true` if data binding is disabled for the named attribute.
    pub fn is_binding_disabled(&self, name: &str) -> bool {
        self.binding_disabled.contains(name)
    }

    // ─── Request state ───────────────────────────────────────────────────────

    /// Returns the session status handle.
    pub fn session_status(&self) -> &SessionStatus {
        &self.session_status
    }

    /// Marks the request as fully handled (no view rendering needed).
    pub fn set_request_handled(&mut self, handled: bool) {
        self.request_handled = handled;
    }

    /// Returns `true` if the request was fully handled.
    pub fn is_request_handled(&self) -> bool {
        self.request_handled
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Returns the response status, if set.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Builds the [`ModelAndView`] describing the outcome.
    pub fn to_model_and_view(&mut self) -> ModelAndView {
        ModelAndView {
            view: self.view.clone(),
            model: self.model().snapshot(),
            status: self.status,
        }
    }
}
