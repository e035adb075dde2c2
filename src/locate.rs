use crate::condition::Condition;
use crate::config::SelectorEngine;
use crate::driver::{Driver, DriverError, ElementRef};
use crate::selector::Selector;

/// One derivation step in a locator pipeline.
#[derive(Debug, Clone)]
enum Step {
    Find(Selector),
    FindAll(Selector),
    Nth(usize),
    Last,
    FilterBy(Condition),
    Active,
}

/// Recipe for resolving elements from the document root. Steps run against
/// the live DOM on every resolution; nothing is cached, so a derived
/// locator (child, index, filter) re-runs its parent's resolution each
/// time and reflects the current page state.
#[derive(Debug, Clone)]
pub struct Locator {
    steps: Vec<Step>,
}

impl Locator {
    pub(crate) fn find(selector: Selector) -> Self {
        Locator {
            steps: vec![Step::Find(selector)],
        }
    }

    pub(crate) fn find_all(selector: Selector) -> Self {
        Locator {
            steps: vec![Step::FindAll(selector)],
        }
    }

    pub(crate) fn active() -> Self {
        Locator {
            steps: vec![Step::Active],
        }
    }

    pub(crate) fn child(&self, selector: Selector) -> Self {
        self.derived(Step::Find(selector))
    }

    pub(crate) fn child_all(&self, selector: Selector) -> Self {
        self.derived(Step::FindAll(selector))
    }

    pub(crate) fn nth(&self, index: usize) -> Self {
        self.derived(Step::Nth(index))
    }

    pub(crate) fn last(&self) -> Self {
        self.derived(Step::Last)
    }

    pub(crate) fn filtered(&self, condition: Condition) -> Self {
        self.derived(Step::FilterBy(condition))
    }

    fn derived(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Locator { steps }
    }

    /// Stable description of the recipe. Never resolves anything.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                Step::Find(selector) | Step::FindAll(selector) => {
                    if out.is_empty() {
                        out = selector.to_string();
                    } else {
                        out = format!("{}/{}", out, selector);
                    }
                }
                Step::Nth(index) => out = format!("{}[{}]", out, index),
                Step::Last => out = format!("{}:last", out),
                Step::FilterBy(condition) => out = format!("{}.filter({})", out, condition),
                Step::Active => out = "active element".to_string(),
            }
        }
        out
    }

    /// Resolve to a single live element. Empty results are a not-found
    /// error, which the polling loop treats as transient.
    pub(crate) async fn resolve_one(
        &self,
        driver: &dyn Driver,
        engine: SelectorEngine,
    ) -> Result<ElementRef, DriverError> {
        match self.walk(driver, engine).await? {
            Cursor::One(element) => Ok(element),
            Cursor::Many(list) => list.first().copied().ok_or_else(|| {
                DriverError::NoSuchElement(format!("no elements matching {}", self.describe()))
            }),
            Cursor::Root => Err(DriverError::Session("empty locator".to_string())),
        }
    }

    /// Resolve to all matching elements in document order. An empty list is
    /// a valid result, not an error.
    pub(crate) async fn resolve_many(
        &self,
        driver: &dyn Driver,
        engine: SelectorEngine,
    ) -> Result<Vec<ElementRef>, DriverError> {
        match self.walk(driver, engine).await? {
            Cursor::Many(list) => Ok(list),
            Cursor::One(element) => Ok(vec![element]),
            Cursor::Root => Err(DriverError::Session("empty locator".to_string())),
        }
    }

    async fn walk(
        &self,
        driver: &dyn Driver,
        engine: SelectorEngine,
    ) -> Result<Cursor, DriverError> {
        let mut cursor = Cursor::Root;
        for step in &self.steps {
            cursor = match (step, cursor) {
                (Step::Find(selector), Cursor::Root) => {
                    Cursor::One(driver.find_element(None, selector, engine).await?)
                }
                (Step::Find(selector), Cursor::One(root)) => {
                    Cursor::One(driver.find_element(Some(&root), selector, engine).await?)
                }
                (Step::FindAll(selector), Cursor::Root) => {
                    Cursor::Many(driver.find_elements(None, selector, engine).await?)
                }
                (Step::FindAll(selector), Cursor::One(root)) => {
                    Cursor::Many(driver.find_elements(Some(&root), selector, engine).await?)
                }
                (Step::Nth(index), Cursor::Many(list)) => match list.get(*index) {
                    Some(element) => Cursor::One(*element),
                    // A short list may still be populating, so out-of-range
                    // indexing reads as not-found and stays retryable
                    None => {
                        return Err(DriverError::NoSuchElement(format!(
                            "index {} out of range, collection has {} element(s)",
                            index,
                            list.len()
                        )));
                    }
                },
                (Step::Last, Cursor::Many(list)) => match list.last() {
                    Some(element) => Cursor::One(*element),
                    None => {
                        return Err(DriverError::NoSuchElement(
                            "last element of an empty collection".to_string(),
                        ));
                    }
                },
                (Step::FilterBy(condition), Cursor::Many(list)) => {
                    let mut kept = Vec::new();
                    for element in list {
                        if condition.apply(driver, &element).await? {
                            kept.push(element);
                        }
                    }
                    Cursor::Many(kept)
                }
                (Step::Active, Cursor::Root) => Cursor::One(driver.active_element().await?),
                (step, _) => {
                    return Err(DriverError::Session(format!(
                        "locator step {:?} applied to an incompatible context",
                        step
                    )));
                }
            };
        }
        Ok(cursor)
    }
}

enum Cursor {
    Root,
    One(ElementRef),
    Many(Vec<ElementRef>),
}

#[cfg(test)]
#[path = "locate_test.rs"]
mod locate_test;
