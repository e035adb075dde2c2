// Common test utilities and fixtures

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use std::sync::Arc;

use webwait::{
    Config, Driver, DriverError, ElementRef, ScriptArg, Selector, SelectorEngine, Session,
    WindowRef,
};

/// Route library logs to the test output when RUST_LOG is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Session with tight timings so timeout tests finish quickly.
pub fn session_with(driver: Arc<FakeDriver>, timeout: Duration, poll: Duration) -> Session {
    Session::new(
        driver,
        Config::new().with_timeout(timeout).with_poll_interval(poll),
    )
}

/// Unwraps the error of a wait that is supposed to fail. Handles do not
/// implement `Debug`, so `unwrap_err` is not available.
pub fn expect_err<T>(result: Result<T, webwait::Error>) -> webwait::Error {
    match result {
        Ok(_) => panic!("expected the wait to fail"),
        Err(e) => e,
    }
}

/// One scripted element. Matching is by exact selector string; this is a
/// test double, not a CSS engine.
#[derive(Clone)]
pub struct FakeElement {
    pub selector: String,
    pub text: String,
    pub tag: String,
    pub visible: bool,
    pub enabled: bool,
    pub selected: bool,
    pub attrs: HashMap<String, String>,
    pub props: HashMap<String, String>,
    pub css: HashMap<String, String>,
    pub pseudos: HashMap<String, String>,
    pub inner_html: String,
    /// Not findable until this much time has passed
    pub appears_after: Option<Duration>,
    /// Findable but reported hidden once this much time has passed
    pub hides_after: Option<Duration>,
    /// No longer findable once this much time has passed
    pub disappears_after: Option<Duration>,
    /// Selector of the parent element, for scoped lookups
    pub parent: Option<String>,
}

impl FakeElement {
    pub fn new(selector: &str) -> Self {
        FakeElement {
            selector: selector.to_string(),
            text: String::new(),
            tag: "div".to_string(),
            visible: true,
            enabled: true,
            selected: false,
            attrs: HashMap::new(),
            props: HashMap::new(),
            css: HashMap::new(),
            pseudos: HashMap::new(),
            inner_html: String::new(),
            appears_after: None,
            hides_after: None,
            disappears_after: None,
            parent: None,
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn prop(mut self, name: &str, value: &str) -> Self {
        self.props.insert(name.to_string(), value.to_string());
        self
    }

    pub fn css(mut self, prop: &str, value: &str) -> Self {
        self.css.insert(prop.to_string(), value.to_string());
        self
    }

    pub fn pseudo(mut self, pseudo: &str, prop: &str, value: &str) -> Self {
        self.pseudos
            .insert(format!("{}/{}", pseudo, prop), value.to_string());
        self
    }

    pub fn inner_html(mut self, html: &str) -> Self {
        self.inner_html = html.to_string();
        self
    }

    pub fn appears_after(mut self, after: Duration) -> Self {
        self.appears_after = Some(after);
        self
    }

    pub fn hides_after(mut self, after: Duration) -> Self {
        self.hides_after = Some(after);
        self
    }

    pub fn disappears_after(mut self, after: Duration) -> Self {
        self.disappears_after = Some(after);
        self
    }

    pub fn parent(mut self, selector: &str) -> Self {
        self.parent = Some(selector.to_string());
        self
    }
}

#[derive(Clone)]
pub struct FakeWindow {
    pub title: String,
    pub name: String,
    pub opens_after: Option<Duration>,
}

/// How scripted frame switches misbehave before succeeding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FrameQuirk {
    None,
    /// Chrome rejects an early switch with an invalid-argument error
    Chrome75,
    /// Firefox replies with a frame id the client cannot decode
    Firefox62,
}

/// Scripted driver. The element list is fixed up front; time-based fields
/// make elements appear, hide or vanish as the test clock advances, which
/// is all the polling engine ever observes.
pub struct FakeDriver {
    elements: Vec<FakeElement>,
    windows: Vec<FakeWindow>,
    current_window: AtomicUsize,
    frame_count: usize,
    frame_quirk: FrameQuirk,
    quirk_failures_left: AtomicUsize,
    alert: Option<(String, Duration)>,
    scripts: HashMap<String, Value>,
    active: Option<String>,
    started: Instant,
    find_calls: AtomicUsize,
    frame_switches: AtomicUsize,
    window_switches: AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Self {
        FakeDriver {
            elements: Vec::new(),
            windows: vec![FakeWindow {
                title: "main".to_string(),
                name: String::new(),
                opens_after: None,
            }],
            current_window: AtomicUsize::new(0),
            frame_count: 0,
            frame_quirk: FrameQuirk::None,
            quirk_failures_left: AtomicUsize::new(0),
            alert: None,
            scripts: HashMap::new(),
            active: None,
            started: Instant::now(),
            find_calls: AtomicUsize::new(0),
            frame_switches: AtomicUsize::new(0),
            window_switches: AtomicUsize::new(0),
        }
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_window(mut self, title: &str, name: &str) -> Self {
        self.windows.push(FakeWindow {
            title: title.to_string(),
            name: name.to_string(),
            opens_after: None,
        });
        self
    }

    pub fn with_window_opening_after(mut self, title: &str, name: &str, after: Duration) -> Self {
        self.windows.push(FakeWindow {
            title: title.to_string(),
            name: name.to_string(),
            opens_after: Some(after),
        });
        self
    }

    pub fn with_frames(mut self, count: usize) -> Self {
        self.frame_count = count;
        self
    }

    pub fn with_frame_quirk(mut self, quirk: FrameQuirk, failures: usize) -> Self {
        self.frame_quirk = quirk;
        self.quirk_failures_left = AtomicUsize::new(failures);
        self
    }

    pub fn with_alert(mut self, text: &str, after: Duration) -> Self {
        self.alert = Some((text.to_string(), after));
        self
    }

    pub fn with_script(mut self, script: &str, result: Value) -> Self {
        self.scripts.insert(script.to_string(), result);
        self
    }

    pub fn with_active(mut self, selector: &str) -> Self {
        self.active = Some(selector.to_string());
        self
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn frame_switches(&self) -> usize {
        self.frame_switches.load(Ordering::SeqCst)
    }

    pub fn window_switches(&self) -> usize {
        self.window_switches.load(Ordering::SeqCst)
    }

    fn present(&self, element: &FakeElement) -> bool {
        let elapsed = self.started.elapsed();
        if let Some(after) = element.appears_after {
            if elapsed < after {
                return false;
            }
        }
        if let Some(after) = element.disappears_after {
            if elapsed >= after {
                return false;
            }
        }
        true
    }

    fn displayed(&self, element: &FakeElement) -> bool {
        if let Some(after) = element.hides_after {
            if self.started.elapsed() >= after {
                return false;
            }
        }
        element.visible
    }

    fn selector_text(selector: &Selector) -> &str {
        match selector {
            Selector::Css(css) => css,
            Selector::XPath(xpath) => xpath,
        }
    }

    fn check_selector(selector: &str) -> Result<(), DriverError> {
        if selector.starts_with("###") {
            return Err(DriverError::InvalidSelector(format!(
                "{} is not a valid selector",
                selector
            )));
        }
        Ok(())
    }

    /// True when any comma-separated alternative of `wanted` names the
    /// element's selector, the way a CSS selector list matches.
    fn matches_selector(element: &FakeElement, wanted: &str) -> bool {
        wanted.split(',').map(str::trim).any(|alt| alt == element.selector)
    }

    fn matching(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
    ) -> Result<Vec<usize>, DriverError> {
        let wanted = Self::selector_text(selector);
        Self::check_selector(wanted)?;
        let parent_selector = match root {
            Some(r) => Some(self.element(r)?.selector.clone()),
            None => None,
        };
        let mut found = Vec::new();
        for (i, element) in self.elements.iter().enumerate() {
            if !Self::matches_selector(element, wanted) || !self.present(element) {
                continue;
            }
            if let Some(parent) = &parent_selector {
                if element.parent.as_deref() != Some(parent.as_str()) {
                    continue;
                }
            }
            found.push(i);
        }
        Ok(found)
    }

    fn element(&self, r: &ElementRef) -> Result<&FakeElement, DriverError> {
        let element = self
            .elements
            .get(r.0 as usize)
            .ok_or_else(|| DriverError::StaleElement(format!("reference {} expired", r.0)))?;
        if !self.present(element) {
            return Err(DriverError::StaleElement(format!(
                "element {} is no longer attached",
                element.selector
            )));
        }
        Ok(element)
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn session_id(&self) -> &str {
        "fake-session"
    }

    async fn find_element(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        _engine: SelectorEngine,
    ) -> Result<ElementRef, DriverError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.matching(root, selector)?;
        match found.first() {
            Some(&i) => Ok(ElementRef(i as u64)),
            None => Err(DriverError::NoSuchElement(selector.to_string())),
        }
    }

    async fn find_elements(
        &self,
        root: Option<&ElementRef>,
        selector: &Selector,
        _engine: SelectorEngine,
    ) -> Result<Vec<ElementRef>, DriverError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.matching(root, selector)?;
        Ok(found.into_iter().map(|i| ElementRef(i as u64)).collect())
    }

    async fn active_element(&self) -> Result<ElementRef, DriverError> {
        match &self.active {
            Some(selector) => {
                let found = self.matching(None, &Selector::css(selector.clone()))?;
                match found.first() {
                    Some(&i) => Ok(ElementRef(i as u64)),
                    None => Err(DriverError::NoSuchElement(
                        "no element has focus".to_string(),
                    )),
                }
            }
            None => Err(DriverError::NoSuchElement(
                "no element has focus".to_string(),
            )),
        }
    }

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element(element)?.text.clone())
    }

    async fn tag_name(&self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element(element)?.tag.clone())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.element(element)?.attrs.get(name).cloned())
    }

    async fn property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.element(element)?.props.get(name).cloned())
    }

    async fn css_value(&self, element: &ElementRef, prop: &str) -> Result<String, DriverError> {
        Ok(self
            .element(element)?
            .css
            .get(prop)
            .cloned()
            .unwrap_or_default())
    }

    async fn pseudo_property(
        &self,
        element: &ElementRef,
        pseudo: &str,
        prop: &str,
    ) -> Result<String, DriverError> {
        Ok(self
            .element(element)?
            .pseudos
            .get(&format!("{}/{}", pseudo, prop))
            .cloned()
            .unwrap_or_default())
    }

    async fn inner_html(&self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.element(element)?.inner_html.clone())
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let element = self.element(element)?;
        Ok(self.displayed(element))
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element(element)?.enabled)
    }

    async fn is_selected(&self, element: &ElementRef) -> Result<bool, DriverError> {
        Ok(self.element(element)?.selected)
    }

    async fn execute_script(
        &self,
        script: &str,
        _args: Vec<ScriptArg>,
    ) -> Result<Value, DriverError> {
        match self.scripts.get(script) {
            Some(value) => Ok(value.clone()),
            None => Err(DriverError::JavascriptError(format!(
                "script not scripted: {}",
                script
            ))),
        }
    }

    async fn switch_to_frame_by_index(&self, index: u16) -> Result<(), DriverError> {
        if self.quirk_failures_left.load(Ordering::SeqCst) > 0 {
            self.quirk_failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(match self.frame_quirk {
                FrameQuirk::Chrome75 => {
                    DriverError::InvalidArgument("'id' out of range".to_string())
                }
                FrameQuirk::Firefox62 => DriverError::Session(
                    "data did not match any variant of untagged enum FrameId".to_string(),
                ),
                FrameQuirk::None => DriverError::NoSuchFrame("scripted failure".to_string()),
            });
        }
        if (index as usize) < self.frame_count {
            self.frame_switches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(DriverError::NoSuchFrame(format!(
                "index {} out of bounds",
                index
            )))
        }
    }

    async fn switch_to_frame_by_element(&self, element: &ElementRef) -> Result<(), DriverError> {
        let element = self.element(element)?;
        if element.tag == "iframe" || element.tag == "frame" {
            self.frame_switches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(DriverError::NoSuchFrame(format!(
                "<{}> is not a frame",
                element.tag
            )))
        }
    }

    async fn switch_to_parent_frame(&self) -> Result<(), DriverError> {
        self.frame_switches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), DriverError> {
        self.frame_switches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn window_handles(&self) -> Result<Vec<WindowRef>, DriverError> {
        let elapsed = self.started.elapsed();
        Ok(self
            .windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.opens_after.map_or(true, |after| elapsed >= after))
            .map(|(i, _)| WindowRef(i as u64))
            .collect())
    }

    async fn current_window(&self) -> Result<WindowRef, DriverError> {
        Ok(WindowRef(self.current_window.load(Ordering::SeqCst) as u64))
    }

    async fn switch_to_window(&self, window: &WindowRef) -> Result<(), DriverError> {
        let i = window.0 as usize;
        if i < self.windows.len() {
            self.current_window.store(i, Ordering::SeqCst);
            self.window_switches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(DriverError::NoSuchWindow(format!(
                "handle {} unknown",
                window.0
            )))
        }
    }

    async fn page_title(&self) -> Result<String, DriverError> {
        let i = self.current_window.load(Ordering::SeqCst);
        Ok(self.windows[i].title.clone())
    }

    async fn window_name(&self) -> Result<String, DriverError> {
        let i = self.current_window.load(Ordering::SeqCst);
        Ok(self.windows[i].name.clone())
    }

    async fn alert_text(&self) -> Result<String, DriverError> {
        match &self.alert {
            Some((text, after)) if self.started.elapsed() >= *after => Ok(text.clone()),
            _ => Err(DriverError::NoSuchAlert("no alert is open".to_string())),
        }
    }
}
