use std::fmt;
use std::time::Duration;

use crate::collection::CollectionCondition;
use crate::condition::Condition;
use crate::config::SelectorEngine;
use crate::driver::{Driver, DriverError, ElementRef};
use crate::errors::Error;
use crate::locate::Locator;
use crate::wait::{Outcome, WaitFailure};

/// Whether the conditions must all hold or all fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Polarity {
    Should,
    ShouldNot,
}

fn effective(condition: &Condition, polarity: Polarity) -> Condition {
    match polarity {
        Polarity::Should => condition.clone(),
        Polarity::ShouldNot => condition.negate(),
    }
}

/// Why one element attempt was not yet satisfied. Kept per attempt so the
/// terminal error renders from the last attempt's data alone.
pub(crate) struct ElementDiag {
    pub detail: ElementFail,
    pub cause: Option<DriverError>,
}

pub(crate) enum ElementFail {
    /// The locator produced nothing (or only stale references)
    NotFound,
    /// The element resolved but the cited condition did not hold
    Unmet {
        condition: String,
        actual: Option<String>,
    },
}

impl fmt::Display for ElementDiag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            ElementFail::NotFound => write!(f, "element not found")?,
            ElementFail::Unmet { condition, actual } => {
                write!(f, "condition {} not met", condition)?;
                if let Some(actual) = actual {
                    write!(f, " (actual: {})", actual)?;
                }
            }
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// One resolve-and-evaluate attempt for a `should*` call.
///
/// Conditions are checked left to right and the first unmet one is cited;
/// for a negated wait each condition is negated before evaluation. Absence
/// of the element satisfies the attempt outright when every effective
/// condition tolerates it, checked before not-found is classified as
/// transient.
pub(crate) async fn check_element_once(
    driver: &dyn Driver,
    engine: SelectorEngine,
    locator: &Locator,
    conditions: &[Condition],
    polarity: Polarity,
) -> Outcome<(), ElementDiag> {
    let element = match locator.resolve_one(driver, engine).await {
        Ok(element) => element,
        Err(e) if e.is_not_found() => {
            // With no conditions the wait degenerates to an existence check,
            // so absence satisfies `should_not` and fails `should`.
            let absence_satisfies = if conditions.is_empty() {
                polarity == Polarity::ShouldNot
            } else {
                conditions
                    .iter()
                    .all(|c| effective(c, polarity).missing_element_satisfies())
            };
            if absence_satisfies {
                return Outcome::Satisfied(());
            }
            return Outcome::NotYet(ElementDiag {
                detail: ElementFail::NotFound,
                cause: Some(e),
            });
        }
        Err(e) if e.is_transient_for_elements() => {
            return Outcome::NotYet(ElementDiag {
                detail: ElementFail::NotFound,
                cause: Some(e),
            });
        }
        Err(e) => return Outcome::Fatal(fatal_error(locator, e)),
    };

    for condition in conditions {
        match effective(condition, polarity).apply(driver, &element).await {
            Ok(true) => {}
            Ok(false) => {
                let actual = condition.actual_value(driver, &element).await;
                return Outcome::NotYet(ElementDiag {
                    detail: ElementFail::Unmet {
                        condition: condition.to_string(),
                        actual,
                    },
                    cause: None,
                });
            }
            Err(e) if e.is_transient_for_elements() => {
                return Outcome::NotYet(ElementDiag {
                    detail: ElementFail::Unmet {
                        condition: condition.to_string(),
                        actual: None,
                    },
                    cause: Some(e),
                });
            }
            Err(e) => return Outcome::Fatal(fatal_error(locator, e)),
        }
    }
    Outcome::Satisfied(())
}

/// A single waiting read: resolve, then extract one value.
#[derive(Clone)]
pub(crate) enum Read {
    Text,
    TagName,
    InnerHtml,
    Attribute(String),
    Property(String),
    CssValue(String),
    Pseudo(String, String),
}

pub(crate) async fn read_element_once(
    driver: &dyn Driver,
    engine: SelectorEngine,
    locator: &Locator,
    read: &Read,
) -> Outcome<Option<String>, ElementDiag> {
    let element = match locator.resolve_one(driver, engine).await {
        Ok(element) => element,
        Err(e) if e.is_transient_for_elements() => {
            return Outcome::NotYet(ElementDiag {
                detail: ElementFail::NotFound,
                cause: Some(e),
            });
        }
        Err(e) => return Outcome::Fatal(fatal_error(locator, e)),
    };
    let value = match read {
        Read::Text => driver.text(&element).await.map(Some),
        Read::TagName => driver.tag_name(&element).await.map(Some),
        Read::InnerHtml => driver.inner_html(&element).await.map(Some),
        Read::Attribute(name) => driver.attribute(&element, name).await,
        Read::Property(name) => driver.property(&element, name).await,
        Read::CssValue(prop) => driver.css_value(&element, prop).await.map(Some),
        Read::Pseudo(pseudo, prop) => {
            driver.pseudo_property(&element, pseudo, prop).await.map(Some)
        }
    };
    match value {
        Ok(value) => Outcome::Satisfied(value),
        Err(e) if e.is_transient_for_elements() => Outcome::NotYet(ElementDiag {
            detail: ElementFail::NotFound,
            cause: Some(e),
        }),
        Err(e) => Outcome::Fatal(fatal_error(locator, e)),
    }
}

/// Why one collection attempt was not yet satisfied.
pub(crate) struct CollectionDiag {
    pub detail: CollectionFail,
    pub cause: Option<DriverError>,
}

pub(crate) enum CollectionFail {
    NotFound,
    Size {
        actual: usize,
        elements: Vec<String>,
    },
    Texts {
        actual: Vec<String>,
    },
}

impl fmt::Display for CollectionDiag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            CollectionFail::NotFound => write!(f, "collection not resolvable")?,
            CollectionFail::Size { actual, .. } => write!(f, "size is {}", actual)?,
            CollectionFail::Texts { actual } => write!(f, "texts are [{}]", actual.join(", "))?,
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// One resolve-and-evaluate attempt for a collection condition.
pub(crate) async fn check_collection_once(
    driver: &dyn Driver,
    engine: SelectorEngine,
    locator: &Locator,
    condition: &CollectionCondition,
) -> Outcome<(), CollectionDiag> {
    let elements = match locator.resolve_many(driver, engine).await {
        Ok(elements) => elements,
        Err(e) if e.is_transient_for_elements() => {
            return Outcome::NotYet(CollectionDiag {
                detail: CollectionFail::NotFound,
                cause: Some(e),
            });
        }
        Err(e) => return Outcome::Fatal(fatal_error(locator, e)),
    };

    match condition.evaluate(driver, &elements).await {
        Ok(verdict) if verdict.satisfied => Outcome::Satisfied(()),
        Ok(verdict) => {
            let detail = match verdict.actual_texts {
                Some(actual) => CollectionFail::Texts { actual },
                None => CollectionFail::Size {
                    actual: elements.len(),
                    elements: snapshot_elements(driver, &elements).await,
                },
            };
            Outcome::NotYet(CollectionDiag {
                detail,
                cause: None,
            })
        }
        Err(e) if e.is_transient_for_elements() => Outcome::NotYet(CollectionDiag {
            detail: CollectionFail::NotFound,
            cause: Some(e),
        }),
        Err(e) => Outcome::Fatal(fatal_error(locator, e)),
    }
}

/// Short description of each element present at this attempt, so timeout
/// errors can list what was actually there.
async fn snapshot_elements(driver: &dyn Driver, elements: &[ElementRef]) -> Vec<String> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        let tag = driver.tag_name(element).await;
        let text = driver.text(element).await;
        match (tag, text) {
            (Ok(tag), Ok(text)) => out.push(format!("<{}>{}</{}>", tag, text, tag)),
            _ => out.push("<unavailable>".to_string()),
        }
    }
    out
}

pub(crate) fn fatal_error(locator: &Locator, e: DriverError) -> Error {
    match e {
        DriverError::InvalidSelector(_) => Error::InvalidSelector {
            selector: locator.describe(),
            cause: e,
        },
        other => Error::Driver(other),
    }
}

fn render_expected(conditions: &[Condition], polarity: Polarity) -> String {
    let labels: Vec<String> = conditions
        .iter()
        .map(|c| effective(c, polarity).to_string())
        .collect();
    if labels.is_empty() {
        "exist".to_string()
    } else {
        labels.join(" and ")
    }
}

/// Maps a terminal element-wait failure onto the typed taxonomy.
pub(crate) fn element_failure(
    failure: WaitFailure<ElementDiag>,
    search: String,
    conditions: &[Condition],
    polarity: Polarity,
    prefix: &str,
    timeout: Duration,
) -> Error {
    match failure {
        WaitFailure::Fatal(error) => error,
        WaitFailure::TimedOut { last, .. } => match last.detail {
            ElementFail::NotFound => Error::ElementNotFound {
                search,
                expected: render_expected(conditions, polarity),
                timeout,
                cause: last.cause,
            },
            ElementFail::Unmet { condition, actual } => match polarity {
                Polarity::Should => Error::ElementShould {
                    search,
                    prefix: prefix.to_string(),
                    condition,
                    actual,
                    timeout,
                    cause: last.cause,
                },
                Polarity::ShouldNot => Error::ElementShouldNot {
                    search,
                    prefix: prefix.to_string(),
                    condition,
                    actual,
                    timeout,
                    cause: last.cause,
                },
            },
        },
    }
}

/// Maps a terminal collection-wait failure onto the typed taxonomy.
pub(crate) fn collection_failure(
    failure: WaitFailure<CollectionDiag>,
    search: String,
    condition: &CollectionCondition,
    timeout: Duration,
) -> Error {
    match failure {
        WaitFailure::Fatal(error) => error,
        WaitFailure::TimedOut { last, .. } => match last.detail {
            CollectionFail::NotFound => Error::ElementNotFound {
                search,
                expected: condition.to_string(),
                timeout,
                cause: last.cause,
            },
            CollectionFail::Size { actual, elements } => Error::ListSizeMismatch {
                expected: condition.expected_size_description(),
                actual,
                collection: search,
                elements,
                timeout,
            },
            CollectionFail::Texts { actual } => Error::TextsMismatch {
                expected: condition.expected_texts(),
                actual,
                collection: search,
                timeout,
            },
        },
    }
}
