use std::time::Duration;

/// How CSS selectors are resolved against the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorEngine {
    /// The driver's own CSS support
    #[default]
    Native,
    /// A selector engine script injected into the page, queried via
    /// executeScript. Useful where the driver's CSS support is incomplete.
    InjectedCss,
}

/// Read-only settings consumed by waits and element resolution.
///
/// The defaults (4 second timeout, 100ms polling) suit most interactive
/// pages; individual calls can override the timeout via the `*_within`
/// variants.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound for a single `should*` call
    pub timeout: Duration,
    /// Sleep between polling attempts
    pub poll_interval: Duration,
    /// CSS resolution strategy
    pub selector_engine: SelectorEngine,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            poll_interval: Duration::from_millis(100),
            selector_engine: SelectorEngine::Native,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_selector_engine(mut self, engine: SelectorEngine) -> Self {
        self.selector_engine = engine;
        self
    }
}
