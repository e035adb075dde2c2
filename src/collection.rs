use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::condition::{Condition, contains_ignore_case, normalize_text};
use crate::driver::{Driver, DriverError, ElementRef};
use crate::element::ElementHandle;
use crate::errors::Error;
use crate::evaluate;
use crate::locate::Locator;
use crate::session::SessionCtx;
use crate::wait::{self, RetryConfig};

/// Comparison applied to a collection's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl SizeOp {
    /// Operator as it appears in size-mismatch messages.
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            SizeOp::Equal => "=",
            SizeOp::NotEqual => "<>",
            SizeOp::Greater => ">",
            SizeOp::GreaterOrEqual => ">=",
            SizeOp::Less => "<",
            SizeOp::LessOrEqual => "<=",
        }
    }

    fn holds(&self, actual: usize, expected: usize) -> bool {
        match self {
            SizeOp::Equal => actual == expected,
            SizeOp::NotEqual => actual != expected,
            SizeOp::Greater => actual > expected,
            SizeOp::GreaterOrEqual => actual >= expected,
            SizeOp::Less => actual < expected,
            SizeOp::LessOrEqual => actual <= expected,
        }
    }
}

/// Predicate over a whole collection, evaluated fresh each polling attempt.
#[derive(Debug, Clone)]
pub enum CollectionCondition {
    Size(SizeOp, usize),
    Empty,
    /// Each element's text contains the expected text at the same
    /// position, case-insensitive; sizes must match
    Texts(Vec<String>),
    /// Each element's text equals the expected text, case-insensitive
    ExactTexts(Vec<String>),
}

pub fn size(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::Equal, expected)
}

pub fn size_greater_than(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::Greater, expected)
}

pub fn size_greater_than_or_equal(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::GreaterOrEqual, expected)
}

pub fn size_less_than(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::Less, expected)
}

pub fn size_less_than_or_equal(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::LessOrEqual, expected)
}

pub fn size_not_equal(expected: usize) -> CollectionCondition {
    CollectionCondition::Size(SizeOp::NotEqual, expected)
}

pub fn empty() -> CollectionCondition {
    CollectionCondition::Empty
}

pub fn texts<I, S>(expected: I) -> CollectionCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CollectionCondition::Texts(expected.into_iter().map(Into::into).collect())
}

pub fn exact_texts<I, S>(expected: I) -> CollectionCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CollectionCondition::ExactTexts(expected.into_iter().map(Into::into).collect())
}

/// Result of evaluating a collection condition once. Text conditions keep
/// the texts they read so diagnostics reuse the same attempt's data.
pub(crate) struct CollectionVerdict {
    pub satisfied: bool,
    pub actual_texts: Option<Vec<String>>,
}

impl CollectionCondition {
    pub(crate) async fn evaluate(
        &self,
        driver: &dyn Driver,
        elements: &[ElementRef],
    ) -> Result<CollectionVerdict, DriverError> {
        match self {
            CollectionCondition::Size(op, expected) => Ok(CollectionVerdict {
                satisfied: op.holds(elements.len(), *expected),
                actual_texts: None,
            }),
            CollectionCondition::Empty => Ok(CollectionVerdict {
                satisfied: elements.is_empty(),
                actual_texts: None,
            }),
            CollectionCondition::Texts(expected) => {
                let actual = read_texts(driver, elements).await?;
                let satisfied = actual.len() == expected.len()
                    && actual
                        .iter()
                        .zip(expected)
                        .all(|(a, e)| contains_ignore_case(a, e));
                Ok(CollectionVerdict {
                    satisfied,
                    actual_texts: Some(actual),
                })
            }
            CollectionCondition::ExactTexts(expected) => {
                let actual = read_texts(driver, elements).await?;
                let satisfied = actual.len() == expected.len()
                    && actual.iter().zip(expected).all(|(a, e)| {
                        normalize_text(a).eq_ignore_ascii_case(&normalize_text(e))
                    });
                Ok(CollectionVerdict {
                    satisfied,
                    actual_texts: Some(actual),
                })
            }
        }
    }

    /// Rendered comparison for size-mismatch messages, e.g. `< 10`.
    pub(crate) fn expected_size_description(&self) -> String {
        match self {
            CollectionCondition::Size(op, expected) => format!("{} {}", op.symbol(), expected),
            CollectionCondition::Empty => "= 0".to_string(),
            CollectionCondition::Texts(expected) | CollectionCondition::ExactTexts(expected) => {
                format!("= {}", expected.len())
            }
        }
    }

    pub(crate) fn expected_texts(&self) -> Vec<String> {
        match self {
            CollectionCondition::Texts(expected) | CollectionCondition::ExactTexts(expected) => {
                expected.clone()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for CollectionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionCondition::Size(op, expected) => {
                write!(f, "size {} {}", op.symbol(), expected)
            }
            CollectionCondition::Empty => write!(f, "empty"),
            CollectionCondition::Texts(expected) => write!(f, "texts [{}]", expected.join(", ")),
            CollectionCondition::ExactTexts(expected) => {
                write!(f, "exact texts [{}]", expected.join(", "))
            }
        }
    }
}

pub(crate) async fn read_texts(
    driver: &dyn Driver,
    elements: &[ElementRef],
) -> Result<Vec<String>, DriverError> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        out.push(driver.text(element).await?);
    }
    Ok(out)
}

/// Lazy handle to an ordered set of elements. Like a single-element
/// handle it re-resolves on every use; derived handles (`get`, `first`,
/// `filter_by`) re-run this collection's resolution each time too.
#[derive(Clone)]
pub struct ElementsCollection {
    ctx: Arc<SessionCtx>,
    locator: Locator,
    alias: Option<String>,
}

impl std::fmt::Debug for ElementsCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementsCollection")
            .field("locator", &self.locator)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl ElementsCollection {
    pub(crate) fn new(ctx: Arc<SessionCtx>, locator: Locator) -> Self {
        ElementsCollection {
            ctx,
            locator,
            alias: None,
        }
    }

    /// Names this collection in diagnostics.
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn describe(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.locator.describe())
    }

    /// Lazy handle to the element at `index`. Out-of-range stays retryable
    /// since the collection may still be populating.
    pub fn get(&self, index: usize) -> ElementHandle {
        ElementHandle::new(self.ctx.clone(), self.locator.nth(index))
    }

    pub fn first(&self) -> ElementHandle {
        self.get(0)
    }

    pub fn last(&self) -> ElementHandle {
        ElementHandle::new(self.ctx.clone(), self.locator.last())
    }

    /// Derived collection keeping only elements that satisfy `condition`
    /// at resolution time.
    pub fn filter_by(&self, condition: Condition) -> ElementsCollection {
        ElementsCollection::new(self.ctx.clone(), self.locator.filtered(condition))
    }

    pub async fn should_have(&self, condition: CollectionCondition) -> Result<&Self, Error> {
        self.verify(condition, self.ctx.config.timeout).await
    }

    pub async fn should_be(&self, condition: CollectionCondition) -> Result<&Self, Error> {
        self.verify(condition, self.ctx.config.timeout).await
    }

    pub async fn should_have_within(
        &self,
        condition: CollectionCondition,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(condition, timeout).await
    }

    pub async fn should_be_within(
        &self,
        condition: CollectionCondition,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(condition, timeout).await
    }

    async fn verify(
        &self,
        condition: CollectionCondition,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        let retry = RetryConfig {
            timeout,
            poll_interval: self.ctx.config.poll_interval,
        };
        let result = wait::until(retry, {
            let ctx = self.ctx.clone();
            let locator = self.locator.clone();
            let condition = condition.clone();
            move || {
                let ctx = ctx.clone();
                let locator = locator.clone();
                let condition = condition.clone();
                async move {
                    evaluate::check_collection_once(
                        ctx.driver.as_ref(),
                        ctx.config.selector_engine,
                        &locator,
                        &condition,
                    )
                    .await
                }
            }
        })
        .await;
        match result {
            Ok(()) => Ok(self),
            Err(failure) => Err(evaluate::collection_failure(
                failure,
                self.describe(),
                &condition,
                timeout,
            )),
        }
    }

    /// Current size, read once without waiting. An unresolvable parent
    /// reads as zero, matching "no matching elements".
    pub async fn size(&self) -> Result<usize, Error> {
        match self
            .locator
            .resolve_many(self.ctx.driver.as_ref(), self.ctx.config.selector_engine)
            .await
        {
            Ok(elements) => Ok(elements.len()),
            Err(e) if e.is_transient_for_elements() => Ok(0),
            Err(e) => Err(evaluate::fatal_error(&self.locator, e)),
        }
    }

    /// Current texts in document order, read once without waiting.
    pub async fn texts(&self) -> Result<Vec<String>, Error> {
        let driver = self.ctx.driver.as_ref();
        match self
            .locator
            .resolve_many(driver, self.ctx.config.selector_engine)
            .await
        {
            Ok(elements) => read_texts(driver, &elements)
                .await
                .map_err(|e| evaluate::fatal_error(&self.locator, e)),
            Err(e) if e.is_transient_for_elements() => Ok(Vec::new()),
            Err(e) => Err(evaluate::fatal_error(&self.locator, e)),
        }
    }
}

#[cfg(test)]
#[path = "collection_test.rs"]
mod collection_test;
