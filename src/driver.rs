use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::SelectorEngine;
use crate::selector::Selector;

/// Opaque reference to a driver-side element.
///
/// Only valid for the duration of one polling attempt; holders re-resolve
/// instead of caching. A reference used after the page mutated surfaces as
/// [`DriverError::StaleElement`] and is retried by the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// Opaque reference to a browser window or tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowRef(pub u64);

/// Argument passed to an injected script.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Json(Value),
    Element(ElementRef),
}

impl From<Value> for ScriptArg {
    fn from(value: Value) -> Self {
        ScriptArg::Json(value)
    }
}

impl From<&str> for ScriptArg {
    fn from(value: &str) -> Self {
        ScriptArg::Json(Value::String(value.to_string()))
    }
}

impl From<ElementRef> for ScriptArg {
    fn from(element: ElementRef) -> Self {
        ScriptArg::Element(element)
    }
}

/// Failure reported by the driver, normalized into the classes the polling
/// loop cares about. Backends that only expose error text map into these by
/// message signature.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("stale element reference: {0}")]
    StaleElement(String),
    #[error("element not interactable: {0}")]
    NotInteractable(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no such frame: {0}")]
    NoSuchFrame(String),
    #[error("no such window: {0}")]
    NoSuchWindow(String),
    #[error("no such alert: {0}")]
    NoSuchAlert(String),
    #[error("javascript error: {0}")]
    JavascriptError(String),
    #[error("{0}")]
    Session(String),
}

impl DriverError {
    /// Whether the element (or the collection it came from) could not be
    /// located at all. Checked before transient classification so that
    /// negated visibility waits can treat absence as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NoSuchElement(_))
    }

    /// Transient classes during element resolution and evaluation: the DOM
    /// may still be settling, so the attempt is repeated until the deadline.
    /// Everything else aborts the wait immediately.
    pub fn is_transient_for_elements(&self) -> bool {
        matches!(
            self,
            DriverError::NoSuchElement(_)
                | DriverError::StaleElement(_)
                | DriverError::NotInteractable(_)
        )
    }
}

/// The narrow surface the waiting core needs from a WebDriver-style backend.
///
/// Implemented by [`crate::webdriver::WebDriverSession`] for real browsers
/// and by scripted fakes in tests. All element reads are pure; nothing here
/// mutates the page.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Stable identifier for this browser session, used to scope
    /// process-wide state such as the injected selector engine.
    fn session_id(&self) -> &str;

    /// Resolve the first element matching `selector`, optionally scoped to
    /// a root element. Absence is an error (`NoSuchElement`), unlike
    /// [`Driver::find_elements`].
    async fn find_element(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        engine: SelectorEngine,
    ) -> Result<ElementRef, DriverError>;

    /// Resolve all elements matching `selector` in document order. An empty
    /// result is valid, not an error.
    async fn find_elements(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        engine: SelectorEngine,
    ) -> Result<Vec<ElementRef>, DriverError>;

    /// The element that currently has focus.
    async fn active_element(&self) -> Result<ElementRef, DriverError>;

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError>;

    async fn tag_name(&self, element: &ElementRef) -> Result<String, DriverError>;

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// DOM property lookup (`value`, `checked`, ...), distinct from
    /// attributes for live form state.
    async fn property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn css_value(&self, element: &ElementRef, prop: &str) -> Result<String, DriverError>;

    /// Computed style of a pseudo-element such as `::before`.
    async fn pseudo_property(
        &self,
        element: &ElementRef,
        pseudo: &str,
        prop: &str,
    ) -> Result<String, DriverError>;

    async fn inner_html(&self, element: &ElementRef) -> Result<String, DriverError>;

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn is_selected(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<ScriptArg>,
    ) -> Result<Value, DriverError>;

    async fn switch_to_frame_by_index(&self, index: u16) -> Result<(), DriverError>;

    async fn switch_to_frame_by_element(&self, element: &ElementRef) -> Result<(), DriverError>;

    async fn switch_to_parent_frame(&self) -> Result<(), DriverError>;

    async fn switch_to_default_content(&self) -> Result<(), DriverError>;

    async fn window_handles(&self) -> Result<Vec<WindowRef>, DriverError>;

    async fn current_window(&self) -> Result<WindowRef, DriverError>;

    async fn switch_to_window(&self, window: &WindowRef) -> Result<(), DriverError>;

    /// Title of the page in the current window.
    async fn page_title(&self) -> Result<String, DriverError>;

    /// `window.name` of the current window.
    async fn window_name(&self) -> Result<String, DriverError>;

    /// Text of the currently open alert, or `NoSuchAlert` if none is open.
    async fn alert_text(&self) -> Result<String, DriverError>;
}
