use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use fantoccini::elements::Element;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{Config, SelectorEngine};
use crate::driver::{Driver, DriverError, ElementRef, ScriptArg, WindowRef};
use crate::errors::Error;
use crate::selector::{
    self, ACTIVE_ELEMENT_SCRIPT, ENGINE_INSTALL_SCRIPT, ENGINE_QUERY_SCRIPT, SCOPED_QUERY_SCRIPT,
    Selector,
};
use crate::session::Session;

// Element refs only live within a single polling attempt, so the registry
// keeps a generous tail of recent entries and drops everything older once
// it doubles up. A ref swept early reads as stale, which retries cleanly.
const ELEMENT_RETAIN: u64 = 4096;
const WINDOW_RETAIN: u64 = 64;

const PROPERTY_SCRIPT: &str = r#"
var v = arguments[0][arguments[1]];
if (v === null || v === undefined) return null;
if (typeof v === 'boolean') return v ? 'true' : 'false';
return String(v);
"#;

const CSS_VALUE_SCRIPT: &str =
    "return window.getComputedStyle(arguments[0]).getPropertyValue(arguments[1]);";

const PSEUDO_PROPERTY_SCRIPT: &str =
    "return window.getComputedStyle(arguments[0], arguments[1]).getPropertyValue(arguments[2]);";

const INNER_HTML_SCRIPT: &str = "return arguments[0].innerHTML;";

const IS_ENABLED_SCRIPT: &str = "return !arguments[0].disabled;";

const IS_SELECTED_SCRIPT: &str =
    "return !!(arguments[0].checked || arguments[0].selected);";

const PAGE_TITLE_SCRIPT: &str = "return document.title;";

const WINDOW_NAME_SCRIPT: &str = "return window.name;";

struct SessionInner {
    client: Client,
    session_id: String,
    elements: DashMap<u64, Element>,
    next_element_id: AtomicU64,
    windows: DashMap<u64, WindowHandle>,
    next_window_id: AtomicU64,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        selector::forget_session(&self.session_id);
    }
}

/// WebDriver-backed [`Driver`] implementation. Wraps a fantoccini client;
/// cloning shares the browser session. This is the only module that talks
/// the WebDriver protocol, everything above it works through the `Driver`
/// trait.
#[derive(Clone)]
pub struct WebDriverSession {
    inner: Arc<SessionInner>,
}

impl WebDriverSession {
    /// Connects to a running WebDriver server, e.g.
    /// `http://localhost:4444` for geckodriver.
    pub async fn connect(webdriver_url: &str) -> Result<Self, Error> {
        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = ClientBuilder::rustls()
            .connect(webdriver_url)
            .await
            .map_err(|e| {
                DriverError::Session(format!(
                    "failed to connect to WebDriver at {}: {}",
                    webdriver_url, e
                ))
            })?;
        Ok(Self::wrap(client))
    }

    /// Connects with explicit session capabilities, for headless mode or
    /// browser-specific options.
    pub async fn connect_with_capabilities(
        webdriver_url: &str,
        capabilities: serde_json::Map<String, Value>,
    ) -> Result<Self, Error> {
        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = ClientBuilder::rustls()
            .capabilities(capabilities)
            .connect(webdriver_url)
            .await
            .map_err(|e| {
                DriverError::Session(format!(
                    "failed to connect to WebDriver at {}: {}",
                    webdriver_url, e
                ))
            })?;
        Ok(Self::wrap(client))
    }

    fn wrap(client: Client) -> Self {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        info!("WebDriver session {} established", session_id);
        WebDriverSession {
            inner: Arc::new(SessionInner {
                client,
                session_id,
                elements: DashMap::new(),
                next_element_id: AtomicU64::new(0),
                windows: DashMap::new(),
                next_window_id: AtomicU64::new(0),
            }),
        }
    }

    /// Wraps this connection in a [`Session`] with the given wait settings.
    pub fn session(&self, config: Config) -> Session {
        Session::new(Arc::new(self.clone()), config)
    }

    /// Navigates and waits for `document.readyState` to settle, which
    /// heads off stale references from probing a page mid-load.
    pub async fn goto(&self, url: &str) -> Result<(), Error> {
        info!("Navigating to {}", url);
        self.inner.client.goto(url).await.map_err(classify)?;

        let wait_script = "return document.readyState === 'complete';";
        for _ in 0..20 {
            match self.inner.client.execute(wait_script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => break,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, Error> {
        let url = self.inner.client.current_url().await.map_err(classify)?;
        Ok(url.to_string())
    }

    /// Ends the browser session.
    pub async fn close(self) -> Result<(), Error> {
        self.inner.client.clone().close().await.map_err(classify)?;
        Ok(())
    }

    fn register_element(&self, element: Element) -> ElementRef {
        let id = self.inner.next_element_id.fetch_add(1, Ordering::Relaxed);
        self.inner.elements.insert(id, element);
        if self.inner.elements.len() as u64 > ELEMENT_RETAIN * 2 {
            let floor = id.saturating_sub(ELEMENT_RETAIN);
            self.inner.elements.retain(|k, _| *k >= floor);
        }
        ElementRef(id)
    }

    fn register_window(&self, handle: WindowHandle) -> WindowRef {
        let id = self.inner.next_window_id.fetch_add(1, Ordering::Relaxed);
        self.inner.windows.insert(id, handle);
        if self.inner.windows.len() as u64 > WINDOW_RETAIN * 2 {
            let floor = id.saturating_sub(WINDOW_RETAIN);
            self.inner.windows.retain(|k, _| *k >= floor);
        }
        WindowRef(id)
    }

    fn lookup_element(&self, element: &ElementRef) -> Result<Element, DriverError> {
        match self.inner.elements.get(&element.0) {
            Some(entry) => Ok(entry.value().clone()),
            None => Err(DriverError::StaleElement(format!(
                "element reference {} expired",
                element.0
            ))),
        }
    }

    fn lookup_window(&self, window: &WindowRef) -> Result<WindowHandle, DriverError> {
        match self.inner.windows.get(&window.0) {
            Some(entry) => Ok(entry.value().clone()),
            None => Err(DriverError::NoSuchWindow(format!(
                "window reference {} expired",
                window.0
            ))),
        }
    }

    fn element_arg(&self, element: &ElementRef) -> Result<Value, DriverError> {
        let element = self.lookup_element(element)?;
        serde_json::to_value(&element)
            .map_err(|e| DriverError::Session(format!("serialize element reference: {}", e)))
    }

    async fn raw_execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.inner.client.execute(script, args).await.map_err(classify)
    }

    async fn install_engine(&self) -> Result<(), DriverError> {
        self.raw_execute(ENGINE_INSTALL_SCRIPT, vec![]).await?;
        if !selector::engine_installed(&self.inner.session_id) {
            debug!(
                "Installed selector engine for session {}",
                self.inner.session_id
            );
            selector::mark_engine_installed(&self.inner.session_id);
        }
        Ok(())
    }

    /// Queries via the injected engine, installing it on first use and
    /// re-installing when a navigation wiped the page it lived in.
    async fn injected_query(
        &self,
        css: &str,
        root: Option<&ElementRef>,
    ) -> Result<Vec<String>, DriverError> {
        let root_arg = match root {
            Some(element) => self.element_arg(element)?,
            None => Value::Null,
        };
        if !selector::engine_installed(&self.inner.session_id) {
            self.install_engine().await?;
        }
        let args = vec![json!(css), root_arg];
        let mut result = self.raw_execute(ENGINE_QUERY_SCRIPT, args.clone()).await?;
        if result.is_null() {
            self.install_engine().await?;
            result = self.raw_execute(ENGINE_QUERY_SCRIPT, args).await?;
        }
        paths_from(result)
    }

    /// Scoped lookup rooted at an element, in plain page JavaScript. Used
    /// for all child resolution so CSS selector groups and XPath behave
    /// the same under a root as they do at the top level.
    async fn scoped_query(
        &self,
        root: &ElementRef,
        selector: &Selector,
        engine: SelectorEngine,
    ) -> Result<Vec<String>, DriverError> {
        match (engine, selector) {
            (SelectorEngine::InjectedCss, Selector::Css(css)) => {
                self.injected_query(css, Some(root)).await
            }
            (_, Selector::Css(css)) => {
                let args = vec![self.element_arg(root)?, json!("css"), json!(css)];
                paths_from(self.raw_execute(SCOPED_QUERY_SCRIPT, args).await?)
            }
            (_, Selector::XPath(xpath)) => {
                let args = vec![self.element_arg(root)?, json!("xpath"), json!(xpath)];
                paths_from(self.raw_execute(SCOPED_QUERY_SCRIPT, args).await?)
            }
        }
    }

    async fn find_by_path(&self, path: &str) -> Result<ElementRef, DriverError> {
        let element = self
            .inner
            .client
            .find(Locator::Css(path))
            .await
            .map_err(classify)?;
        Ok(self.register_element(element))
    }

    async fn string_from_script(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Option<String>, DriverError> {
        match self.raw_execute(script, args).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }
}

/// Folds fantoccini's error surface into [`DriverError`] by the W3C error
/// strings embedded in the messages. The protocol does not expose a typed
/// distinction for most of these, and drivers word the details differently,
/// so the stable part is the error code text.
fn classify(e: fantoccini::error::CmdError) -> DriverError {
    classify_message(e.to_string())
}

fn classify_message(msg: String) -> DriverError {
    let lower = msg.to_lowercase();
    if lower.contains("no such element") || lower.contains("unable to locate element") {
        DriverError::NoSuchElement(msg)
    } else if lower.contains("stale element") {
        DriverError::StaleElement(msg)
    } else if lower.contains("not interactable") || lower.contains("element not visible") {
        DriverError::NotInteractable(msg)
    } else if lower.contains("invalid selector") || lower.contains("invalid xpath") {
        DriverError::InvalidSelector(msg)
    } else if lower.contains("invalid argument") {
        DriverError::InvalidArgument(msg)
    } else if lower.contains("no such frame") {
        DriverError::NoSuchFrame(msg)
    } else if lower.contains("no such window") || lower.contains("window was already closed") {
        DriverError::NoSuchWindow(msg)
    } else if lower.contains("no such alert") || lower.contains("no modal dialog") {
        DriverError::NoSuchAlert(msg)
    } else if lower.contains("javascript error") {
        DriverError::JavascriptError(msg)
    } else {
        DriverError::Session(msg)
    }
}

fn paths_from(value: Value) -> Result<Vec<String>, DriverError> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()),
        other => Err(DriverError::JavascriptError(format!(
            "selector query returned {} instead of an array",
            other
        ))),
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    async fn find_element(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        engine: SelectorEngine,
    ) -> Result<ElementRef, DriverError> {
        match root {
            None => match (engine, selector) {
                (SelectorEngine::InjectedCss, Selector::Css(css)) => {
                    let paths = self.injected_query(css, None).await?;
                    match paths.into_iter().next() {
                        Some(path) => self.find_by_path(&path).await,
                        None => Err(DriverError::NoSuchElement(format!(
                            "no element matching {}",
                            selector
                        ))),
                    }
                }
                (_, Selector::Css(css)) => {
                    let element = self
                        .inner
                        .client
                        .find(Locator::Css(css))
                        .await
                        .map_err(classify)?;
                    Ok(self.register_element(element))
                }
                (_, Selector::XPath(xpath)) => {
                    let element = self
                        .inner
                        .client
                        .find(Locator::XPath(xpath))
                        .await
                        .map_err(classify)?;
                    Ok(self.register_element(element))
                }
            },
            Some(root) => {
                let paths = self.scoped_query(root, selector, engine).await?;
                match paths.into_iter().next() {
                    Some(path) => self.find_by_path(&path).await,
                    None => Err(DriverError::NoSuchElement(format!(
                        "no element matching {}",
                        selector
                    ))),
                }
            }
        }
    }

    async fn find_elements(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        engine: SelectorEngine,
    ) -> Result<Vec<ElementRef>, DriverError> {
        let paths = match root {
            None => match (engine, selector) {
                (SelectorEngine::InjectedCss, Selector::Css(css)) => {
                    self.injected_query(css, None).await?
                }
                (_, Selector::Css(css)) => {
                    let elements = self
                        .inner
                        .client
                        .find_all(Locator::Css(css))
                        .await
                        .map_err(classify)?;
                    return Ok(elements
                        .into_iter()
                        .map(|e| self.register_element(e))
                        .collect());
                }
                (_, Selector::XPath(xpath)) => {
                    let elements = self
                        .inner
                        .client
                        .find_all(Locator::XPath(xpath))
                        .await
                        .map_err(classify)?;
                    return Ok(elements
                        .into_iter()
                        .map(|e| self.register_element(e))
                        .collect());
                }
            },
            Some(root) => self.scoped_query(root, selector, engine).await?,
        };
        let mut out = Vec::with_capacity(paths.len());
        for path in &paths {
            out.push(self.find_by_path(path).await?);
        }
        Ok(out)
    }

    async fn active_element(&self) -> Result<ElementRef, DriverError> {
        match self.string_from_script(ACTIVE_ELEMENT_SCRIPT, vec![]).await? {
            Some(path) => self.find_by_path(&path).await,
            None => Err(DriverError::NoSuchElement(
                "no element has focus".to_string(),
            )),
        }
    }

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        let element = self.lookup_element(element)?;
        element.text().await.map_err(classify)
    }

    async fn tag_name(&self, element: &ElementRef) -> Result<String, DriverError> {
        let element = self.lookup_element(element)?;
        let tag = element.tag_name().await.map_err(classify)?;
        Ok(tag.to_lowercase())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let element = self.lookup_element(element)?;
        element.attr(name).await.map_err(classify)
    }

    async fn property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let args = vec![self.element_arg(element)?, json!(name)];
        self.string_from_script(PROPERTY_SCRIPT, args).await
    }

    async fn css_value(&self, element: &ElementRef, prop: &str) -> Result<String, DriverError> {
        let args = vec![self.element_arg(element)?, json!(prop)];
        let value = self.string_from_script(CSS_VALUE_SCRIPT, args).await?;
        Ok(value.unwrap_or_default())
    }

    async fn pseudo_property(
        &self,
        element: &ElementRef,
        pseudo: &str,
        prop: &str,
    ) -> Result<String, DriverError> {
        let args = vec![self.element_arg(element)?, json!(pseudo), json!(prop)];
        let value = self.string_from_script(PSEUDO_PROPERTY_SCRIPT, args).await?;
        Ok(value.unwrap_or_default())
    }

    async fn inner_html(&self, element: &ElementRef) -> Result<String, DriverError> {
        let args = vec![self.element_arg(element)?];
        let value = self.string_from_script(INNER_HTML_SCRIPT, args).await?;
        Ok(value.unwrap_or_default())
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let element = self.lookup_element(element)?;
        element.is_displayed().await.map_err(classify)
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let args = vec![self.element_arg(element)?];
        let value = self.raw_execute(IS_ENABLED_SCRIPT, args).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_selected(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let args = vec![self.element_arg(element)?];
        let value = self.raw_execute(IS_SELECTED_SCRIPT, args).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<ScriptArg>,
    ) -> Result<Value, DriverError> {
        let mut json_args = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                ScriptArg::Json(value) => json_args.push(value),
                ScriptArg::Element(element) => json_args.push(self.element_arg(&element)?),
            }
        }
        self.raw_execute(script, json_args).await
    }

    async fn switch_to_frame_by_index(&self, index: u16) -> Result<(), DriverError> {
        let _ = self
            .inner
            .client
            .clone()
            .enter_frame(Some(index))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn switch_to_frame_by_element(&self, element: &ElementRef) -> Result<(), DriverError> {
        let _ = self
            .lookup_element(element)?
            .enter_frame()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> Result<(), DriverError> {
        let _ = self
            .inner
            .client
            .clone()
            .enter_parent_frame()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), DriverError> {
        let _ = self
            .inner
            .client
            .clone()
            .enter_frame(None)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn window_handles(&self) -> Result<Vec<WindowRef>, DriverError> {
        let handles = self.inner.client.windows().await.map_err(classify)?;
        Ok(handles
            .into_iter()
            .map(|h| self.register_window(h))
            .collect())
    }

    async fn current_window(&self) -> Result<WindowRef, DriverError> {
        let handle = self.inner.client.window().await.map_err(classify)?;
        Ok(self.register_window(handle))
    }

    async fn switch_to_window(&self, window: &WindowRef) -> Result<(), DriverError> {
        let handle = self.lookup_window(window)?;
        self.inner
            .client
            .switch_to_window(handle)
            .await
            .map_err(classify)
    }

    async fn page_title(&self) -> Result<String, DriverError> {
        let value = self.string_from_script(PAGE_TITLE_SCRIPT, vec![]).await?;
        Ok(value.unwrap_or_default())
    }

    async fn window_name(&self) -> Result<String, DriverError> {
        let value = self.string_from_script(WINDOW_NAME_SCRIPT, vec![]).await?;
        Ok(value.unwrap_or_default())
    }

    async fn alert_text(&self) -> Result<String, DriverError> {
        self.inner
            .client
            .clone()
            .get_alert_text()
            .await
            .map_err(classify)
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
