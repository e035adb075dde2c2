use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::driver::{Driver, DriverError, ElementRef, ScriptArg};

/// A named, composable predicate over a live element.
///
/// Conditions are immutable values: composition (`negate`, `because`,
/// `named`) wraps rather than mutates, and double negation restores the
/// original. Evaluation is a pure read over the element; nothing here
/// touches the DOM.
///
/// The set is closed on purpose. Custom checks go through
/// [`custom_script`], which runs a JS predicate against the element.
#[derive(Debug, Clone)]
pub enum Condition {
    /// The element is attached to the DOM, visible or not
    Exist,
    Visible,
    /// Invisible, or absent entirely
    Hidden,
    Enabled,
    Disabled,
    Selected,
    /// Text contains the given string, case-insensitive, whitespace folded
    Text(String),
    /// Whole text equals the given string, case-insensitive
    ExactText(String),
    /// Text contains the given string, case-sensitive
    CaseSensitiveText(String),
    /// Whole text matches the given regular expression
    MatchText(String),
    /// `value` property contains the given string, case-insensitive
    Value(String),
    /// The attribute is present, with any value
    Attribute(String),
    /// The attribute equals the given value exactly
    AttributeValue(String, String),
    /// The `class` attribute contains the given class name
    CssClass(String),
    /// Computed style property equals the given value (case-insensitive)
    CssValue(String, String),
    /// Computed style of a pseudo-element
    Pseudo {
        pseudo: String,
        prop: String,
        expected: String,
    },
    /// User-supplied JS predicate; receives the element as `arguments[0]`
    Script { name: String, script: String },
    /// Relabels the wrapped condition in diagnostics
    Named { name: String, inner: Box<Condition> },
    /// Appends a user-supplied reason to diagnostics
    Because {
        reason: String,
        inner: Box<Condition>,
    },
    /// Logical negation of the wrapped condition
    Not(Box<Condition>),
}

pub fn exist() -> Condition {
    Condition::Exist
}

pub fn visible() -> Condition {
    Condition::Visible
}

pub fn hidden() -> Condition {
    Condition::Hidden
}

pub fn enabled() -> Condition {
    Condition::Enabled
}

pub fn disabled() -> Condition {
    Condition::Disabled
}

pub fn selected() -> Condition {
    Condition::Selected
}

pub fn text(expected: impl Into<String>) -> Condition {
    Condition::Text(expected.into())
}

pub fn exact_text(expected: impl Into<String>) -> Condition {
    Condition::ExactText(expected.into())
}

pub fn case_sensitive_text(expected: impl Into<String>) -> Condition {
    Condition::CaseSensitiveText(expected.into())
}

/// The pattern must match the whole text. Compiled lazily at evaluation
/// time; an invalid pattern aborts the wait instead of retrying.
pub fn match_text(pattern: impl Into<String>) -> Condition {
    Condition::MatchText(pattern.into())
}

pub fn value(expected: impl Into<String>) -> Condition {
    Condition::Value(expected.into())
}

pub fn attribute(name: impl Into<String>) -> Condition {
    Condition::Attribute(name.into())
}

pub fn attribute_value(name: impl Into<String>, expected: impl Into<String>) -> Condition {
    Condition::AttributeValue(name.into(), expected.into())
}

pub fn css_class(class: impl Into<String>) -> Condition {
    Condition::CssClass(class.into())
}

pub fn css_value(prop: impl Into<String>, expected: impl Into<String>) -> Condition {
    Condition::CssValue(prop.into(), expected.into())
}

pub fn pseudo(
    pseudo: impl Into<String>,
    prop: impl Into<String>,
    expected: impl Into<String>,
) -> Condition {
    Condition::Pseudo {
        pseudo: pseudo.into(),
        prop: prop.into(),
        expected: expected.into(),
    }
}

pub fn custom_script(name: impl Into<String>, script: impl Into<String>) -> Condition {
    Condition::Script {
        name: name.into(),
        script: script.into(),
    }
}

impl Condition {
    /// Logical negation. Negating a negation unwraps it, so
    /// `c.negate().negate()` is structurally `c` again.
    pub fn negate(&self) -> Condition {
        match self {
            Condition::Not(inner) => (**inner).clone(),
            other => Condition::Not(Box::new(other.clone())),
        }
    }

    /// Attach a reason shown in failure diagnostics, e.g.
    /// `visible().because("the form was submitted")`.
    pub fn because(self, reason: impl Into<String>) -> Condition {
        Condition::Because {
            reason: reason.into(),
            inner: Box::new(self),
        }
    }

    /// Relabel this condition in diagnostics.
    pub fn named(self, name: impl Into<String>) -> Condition {
        Condition::Named {
            name: name.into(),
            inner: Box::new(self),
        }
    }

    /// Whether absence of the element counts as this condition being
    /// satisfied. True for `hidden` and negated visibility/existence:
    /// "should not be visible" holds trivially for an element that is not
    /// there at all. Checked per attempt before a not-found failure is
    /// classified as transient.
    pub fn missing_element_satisfies(&self) -> bool {
        match self.peel() {
            Condition::Hidden => true,
            Condition::Not(inner) => {
                matches!(inner.peel(), Condition::Visible | Condition::Exist)
            }
            _ => false,
        }
    }

    /// Strips diagnostic decorators (`Named`, `Because`), keeping negation.
    fn peel(&self) -> &Condition {
        match self {
            Condition::Named { inner, .. } | Condition::Because { inner, .. } => inner.peel(),
            other => other,
        }
    }

    /// Evaluate against a resolved element. Driver failures propagate so
    /// the caller can classify them as transient or fatal.
    pub async fn apply(
        &self,
        driver: &dyn Driver,
        element: &ElementRef,
    ) -> Result<bool, DriverError> {
        match self {
            Condition::Exist => driver.tag_name(element).await.map(|_| true),
            Condition::Visible => driver.is_displayed(element).await,
            Condition::Hidden => Ok(!driver.is_displayed(element).await?),
            Condition::Enabled => driver.is_enabled(element).await,
            Condition::Disabled => Ok(!driver.is_enabled(element).await?),
            Condition::Selected => driver.is_selected(element).await,
            Condition::Text(expected) => {
                let actual = driver.text(element).await?;
                Ok(contains_ignore_case(&actual, expected))
            }
            Condition::ExactText(expected) => {
                let actual = driver.text(element).await?;
                Ok(normalize_text(&actual).eq_ignore_ascii_case(&normalize_text(expected)))
            }
            Condition::CaseSensitiveText(expected) => {
                let actual = driver.text(element).await?;
                Ok(normalize_text(&actual).contains(&normalize_text(expected)))
            }
            Condition::MatchText(pattern) => {
                let re = compile_full_match(pattern)?;
                let actual = driver.text(element).await?;
                Ok(re.is_match(&actual))
            }
            Condition::Value(expected) => {
                let actual = driver.property(element, "value").await?.unwrap_or_default();
                Ok(contains_ignore_case(&actual, expected))
            }
            Condition::Attribute(name) => Ok(driver.attribute(element, name).await?.is_some()),
            Condition::AttributeValue(name, expected) => {
                Ok(driver.attribute(element, name).await?.as_deref() == Some(expected.as_str()))
            }
            Condition::CssClass(class) => {
                let classes = driver
                    .attribute(element, "class")
                    .await?
                    .unwrap_or_default();
                Ok(classes.split_whitespace().any(|c| c == class))
            }
            Condition::CssValue(prop, expected) => {
                let actual = driver.css_value(element, prop).await?;
                Ok(actual.eq_ignore_ascii_case(expected))
            }
            Condition::Pseudo {
                pseudo,
                prop,
                expected,
            } => {
                let actual = driver.pseudo_property(element, pseudo, prop).await?;
                Ok(actual == *expected)
            }
            Condition::Script { script, .. } => {
                let result = driver
                    .execute_script(script, vec![ScriptArg::Element(*element)])
                    .await?;
                Ok(is_truthy(&result))
            }
            Condition::Named { inner, .. } | Condition::Because { inner, .. } => {
                Box::pin(inner.apply(driver, element)).await
            }
            Condition::Not(inner) => Ok(!Box::pin(inner.apply(driver, element)).await?),
        }
    }

    /// Best-effort description of the element's real state, for error
    /// messages only. Degrades to `None` instead of failing.
    pub async fn actual_value(&self, driver: &dyn Driver, element: &ElementRef) -> Option<String> {
        match self {
            Condition::Exist => Some("exists".to_string()),
            Condition::Visible | Condition::Hidden => {
                match driver.is_displayed(element).await {
                    Ok(true) => Some("visible".to_string()),
                    Ok(false) => Some("hidden".to_string()),
                    Err(_) => None,
                }
            }
            Condition::Enabled | Condition::Disabled => match driver.is_enabled(element).await {
                Ok(true) => Some("enabled".to_string()),
                Ok(false) => Some("disabled".to_string()),
                Err(_) => None,
            },
            Condition::Selected => match driver.is_selected(element).await {
                Ok(true) => Some("selected".to_string()),
                Ok(false) => Some("not selected".to_string()),
                Err(_) => None,
            },
            Condition::Text(_)
            | Condition::ExactText(_)
            | Condition::CaseSensitiveText(_)
            | Condition::MatchText(_) => driver
                .text(element)
                .await
                .ok()
                .map(|t| format!("text=\"{}\"", t)),
            Condition::Value(_) => driver
                .property(element, "value")
                .await
                .ok()
                .flatten()
                .map(|v| format!("value=\"{}\"", v)),
            Condition::Attribute(name) | Condition::AttributeValue(name, _) => {
                match driver.attribute(element, name).await {
                    Ok(Some(v)) => Some(format!("{}=\"{}\"", name, v)),
                    Ok(None) => Some(format!("no \"{}\" attribute", name)),
                    Err(_) => None,
                }
            }
            Condition::CssClass(_) => match driver.attribute(element, "class").await {
                Ok(Some(v)) => Some(format!("class=\"{}\"", v)),
                Ok(None) => Some("no \"class\" attribute".to_string()),
                Err(_) => None,
            },
            Condition::CssValue(prop, _) => driver
                .css_value(element, prop)
                .await
                .ok()
                .map(|v| format!("{}={}", prop, v)),
            Condition::Pseudo { pseudo, prop, .. } => driver
                .pseudo_property(element, pseudo, prop)
                .await
                .ok()
                .map(|v| format!("{}/{}={}", pseudo, prop, v)),
            Condition::Script { .. } => None,
            Condition::Named { inner, .. }
            | Condition::Because { inner, .. }
            | Condition::Not(inner) => Box::pin(inner.actual_value(driver, element)).await,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Exist => write!(f, "exist"),
            Condition::Visible => write!(f, "visible"),
            Condition::Hidden => write!(f, "hidden"),
            Condition::Enabled => write!(f, "enabled"),
            Condition::Disabled => write!(f, "disabled"),
            Condition::Selected => write!(f, "selected"),
            Condition::Text(expected) => write!(f, "text \"{}\"", expected),
            Condition::ExactText(expected) => write!(f, "exact text \"{}\"", expected),
            Condition::CaseSensitiveText(expected) => {
                write!(f, "text case sensitive \"{}\"", expected)
            }
            Condition::MatchText(pattern) => write!(f, "match text \"{}\"", pattern),
            Condition::Value(expected) => write!(f, "value \"{}\"", expected),
            Condition::Attribute(name) => write!(f, "attribute {}", name),
            Condition::AttributeValue(name, expected) => {
                write!(f, "attribute {}=\"{}\"", name, expected)
            }
            Condition::CssClass(class) => write!(f, "css class \"{}\"", class),
            Condition::CssValue(prop, expected) => {
                write!(f, "css value {}={}", prop, expected)
            }
            Condition::Pseudo {
                pseudo,
                prop,
                expected,
            } => write!(
                f,
                "pseudo-element {} property {} value \"{}\"",
                pseudo, prop, expected
            ),
            Condition::Script { name, .. } => write!(f, "match '{}' predicate", name),
            Condition::Named { name, .. } => write!(f, "{}", name),
            Condition::Because { reason, inner } => {
                write!(f, "{} (because {})", inner, reason)
            }
            Condition::Not(inner) => write!(f, "not {}", inner),
        }
    }
}

/// One or more conditions, so the `should*` verbs accept a single
/// condition, an array, or a Vec without separate method names.
#[derive(Clone)]
pub struct Conditions(pub(crate) Vec<Condition>);

impl From<Condition> for Conditions {
    fn from(condition: Condition) -> Self {
        Conditions(vec![condition])
    }
}

impl<const N: usize> From<[Condition; N]> for Conditions {
    fn from(conditions: [Condition; N]) -> Self {
        Conditions(conditions.into())
    }
}

impl From<Vec<Condition>> for Conditions {
    fn from(conditions: Vec<Condition>) -> Self {
        Conditions(conditions)
    }
}

/// Folds runs of whitespace to single spaces and trims, the way browsers
/// render text.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn contains_ignore_case(actual: &str, expected: &str) -> bool {
    normalize_text(actual)
        .to_lowercase()
        .contains(&normalize_text(expected).to_lowercase())
}

fn compile_full_match(pattern: &str) -> Result<Regex, DriverError> {
    Regex::new(&format!("^(?s:{})$", pattern))
        .map_err(|e| DriverError::InvalidArgument(format!("bad text pattern \"{}\": {}", pattern, e)))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
#[path = "condition_test.rs"]
mod condition_test;
