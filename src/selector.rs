use std::fmt;

use dashmap::DashMap;
use lazy_static::lazy_static;

/// A selector for locating elements. CSS is the common case; `&str`
/// converts into it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Selector::XPath(selector.into())
    }
}

impl From<&str> for Selector {
    fn from(selector: &str) -> Self {
        Selector::Css(selector.to_string())
    }
}

impl From<String> for Selector {
    fn from(selector: String) -> Self {
        Selector::Css(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{}", css),
            Selector::XPath(xpath) => write!(f, "xpath: {}", xpath),
        }
    }
}

lazy_static! {
    /// Sessions that have had the selector engine installed at least once.
    /// Keyed by session id so concurrent browser sessions keep independent
    /// injection state; the entry is removed when the session is dropped.
    static ref ENGINE_SESSIONS: DashMap<String, bool> = DashMap::new();
}

pub(crate) fn engine_installed(session_id: &str) -> bool {
    ENGINE_SESSIONS.contains_key(session_id)
}

pub(crate) fn mark_engine_installed(session_id: &str) {
    ENGINE_SESSIONS.insert(session_id.to_string(), true);
}

pub(crate) fn forget_session(session_id: &str) {
    ENGINE_SESSIONS.remove(session_id);
}

// The scripts below identify elements by canonical nth-child paths instead of
// returning DOM nodes. Paths survive the trip through executeScript as plain
// strings and are re-resolved natively; a path that went stale in between is
// caught by the polling loop like any other stale reference.

/// Installs the page-side selector engine. Idempotent.
pub(crate) const ENGINE_INSTALL_SCRIPT: &str = r#"
if (typeof window.__wwQuery === 'undefined') {
    var cssPath = function(el) {
        if (!el || el.nodeType !== 1) return null;
        if (el === document.documentElement) return 'html';
        var segs = [];
        while (el && el.nodeType === 1 && el !== document.documentElement) {
            var i = 1, sib = el;
            while ((sib = sib.previousElementSibling)) i++;
            segs.unshift(el.tagName.toLowerCase() + ':nth-child(' + i + ')');
            el = el.parentElement;
        }
        return 'html > ' + segs.join(' > ');
    };
    window.__wwQuery = function(selector, root) {
        var scope = root || document;
        var found = scope.querySelectorAll(selector);
        var paths = [];
        for (var i = 0; i < found.length; i++) paths.push(cssPath(found[i]));
        return paths;
    };
    window.__wwPath = cssPath;
}
return true;
"#;

/// Runs a query through the installed engine. Returns null when the engine
/// is missing (a navigation wiped the page), so the caller re-installs.
pub(crate) const ENGINE_QUERY_SCRIPT: &str = r#"
if (typeof window.__wwQuery === 'undefined') return null;
return window.__wwQuery(arguments[0], arguments[1] || null);
"#;

/// Scoped lookup without the injected engine: CSS via querySelectorAll on
/// the root, XPath via document.evaluate. arguments: [root, kind, selector].
pub(crate) const SCOPED_QUERY_SCRIPT: &str = r#"
var cssPath = function(el) {
    if (!el || el.nodeType !== 1) return null;
    if (el === document.documentElement) return 'html';
    var segs = [];
    while (el && el.nodeType === 1 && el !== document.documentElement) {
        var i = 1, sib = el;
        while ((sib = sib.previousElementSibling)) i++;
        segs.unshift(el.tagName.toLowerCase() + ':nth-child(' + i + ')');
        el = el.parentElement;
    }
    return 'html > ' + segs.join(' > ');
};
var root = arguments[0], kind = arguments[1], selector = arguments[2];
var paths = [];
if (kind === 'xpath') {
    var result = document.evaluate(selector, root, null,
        XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    for (var i = 0; i < result.snapshotLength; i++) {
        paths.push(cssPath(result.snapshotItem(i)));
    }
} else {
    var found = root.querySelectorAll(selector);
    for (var j = 0; j < found.length; j++) paths.push(cssPath(found[j]));
}
return paths;
"#;

/// Canonical path of the focused element, for lazy active-element handles.
pub(crate) const ACTIVE_ELEMENT_SCRIPT: &str = r#"
var el = document.activeElement;
if (!el || el.nodeType !== 1) return null;
if (el === document.documentElement) return 'html';
var segs = [];
while (el && el.nodeType === 1 && el !== document.documentElement) {
    var i = 1, sib = el;
    while ((sib = sib.previousElementSibling)) i++;
    segs.unshift(el.tagName.toLowerCase() + ':nth-child(' + i + ')');
    el = el.parentElement;
}
return 'html > ' + segs.join(' > ');
"#;

#[cfg(test)]
#[path = "selector_test.rs"]
mod selector_test;
