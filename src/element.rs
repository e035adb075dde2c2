use std::sync::Arc;
use std::time::Duration;

use crate::collection::ElementsCollection;
use crate::condition::{self, Condition, Conditions};
use crate::driver::ElementRef;
use crate::errors::Error;
use crate::evaluate::{self, Polarity, Read};
use crate::locate::Locator;
use crate::selector::Selector;
use crate::session::SessionCtx;
use crate::wait::{self, Outcome, RetryConfig};

/// Lazy handle to a single element. The handle holds only a resolution
/// recipe; every operation re-resolves against the live DOM, so a handle
/// built before a page finished loading (or before it navigated) keeps
/// working afterwards. Cloning shares the recipe, nothing else.
#[derive(Clone)]
pub struct ElementHandle {
    ctx: Arc<SessionCtx>,
    locator: Locator,
    alias: Option<String>,
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle")
            .field("locator", &self.locator)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl ElementHandle {
    pub(crate) fn new(ctx: Arc<SessionCtx>, locator: Locator) -> Self {
        ElementHandle {
            ctx,
            locator,
            alias: None,
        }
    }

    /// Names this element in diagnostics, e.g. `"save button"` instead of
    /// the raw selector.
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Stable description of what this handle looks for. Never resolves.
    pub fn describe(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.locator.describe())
    }

    pub(crate) fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Child handle, resolved parent-first on every use.
    pub fn find(&self, selector: impl Into<Selector>) -> ElementHandle {
        ElementHandle::new(self.ctx.clone(), self.locator.child(selector.into()))
    }

    /// Child collection, resolved parent-first on every use.
    pub fn find_all(&self, selector: impl Into<Selector>) -> ElementsCollection {
        ElementsCollection::new(self.ctx.clone(), self.locator.child_all(selector.into()))
    }

    /// Resolves immediately, without retrying. Fails with `ElementNotFound`
    /// when the locator yields nothing right now.
    pub async fn resolve_now(&self) -> Result<ElementRef, Error> {
        match self
            .locator
            .resolve_one(self.ctx.driver.as_ref(), self.ctx.config.selector_engine)
            .await
        {
            Ok(element) => Ok(element),
            Err(e) if e.is_transient_for_elements() => Err(Error::ElementNotFound {
                search: self.describe(),
                expected: "exist".to_string(),
                timeout: Duration::ZERO,
                cause: Some(e),
            }),
            Err(e) => Err(evaluate::fatal_error(&self.locator, e)),
        }
    }

    /// Waits until every condition holds, polling within the session
    /// timeout. Accepts one condition, an array, or a Vec; conditions are
    /// checked left to right and the first unmet one is reported. Returns
    /// the handle for chaining.
    pub async fn should(&self, conditions: impl Into<Conditions>) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::Should, "", self.ctx.config.timeout)
            .await
    }

    /// Same as `should`, reads as `should be visible`.
    pub async fn should_be(&self, conditions: impl Into<Conditions>) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::Should, "be ", self.ctx.config.timeout)
            .await
    }

    /// Same as `should`, reads as `should have text "..."`.
    pub async fn should_have(&self, conditions: impl Into<Conditions>) -> Result<&Self, Error> {
        self.verify(
            conditions.into(),
            Polarity::Should,
            "have ",
            self.ctx.config.timeout,
        )
        .await
    }

    /// Waits until every condition fails to hold. An element that does not
    /// exist satisfies `should_not(visible)` on the first attempt.
    pub async fn should_not(&self, conditions: impl Into<Conditions>) -> Result<&Self, Error> {
        self.verify(
            conditions.into(),
            Polarity::ShouldNot,
            "",
            self.ctx.config.timeout,
        )
        .await
    }

    pub async fn should_not_be(&self, conditions: impl Into<Conditions>) -> Result<&Self, Error> {
        self.verify(
            conditions.into(),
            Polarity::ShouldNot,
            "be ",
            self.ctx.config.timeout,
        )
        .await
    }

    pub async fn should_not_have(
        &self,
        conditions: impl Into<Conditions>,
    ) -> Result<&Self, Error> {
        self.verify(
            conditions.into(),
            Polarity::ShouldNot,
            "have ",
            self.ctx.config.timeout,
        )
        .await
    }

    /// `should` with a per-call timeout instead of the session default.
    pub async fn should_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::Should, "", timeout)
            .await
    }

    pub async fn should_be_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::Should, "be ", timeout)
            .await
    }

    pub async fn should_have_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::Should, "have ", timeout)
            .await
    }

    pub async fn should_not_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::ShouldNot, "", timeout)
            .await
    }

    pub async fn should_not_be_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::ShouldNot, "be ", timeout)
            .await
    }

    pub async fn should_not_have_within(
        &self,
        conditions: impl Into<Conditions>,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        self.verify(conditions.into(), Polarity::ShouldNot, "have ", timeout)
            .await
    }

    async fn verify(
        &self,
        conditions: Conditions,
        polarity: Polarity,
        prefix: &'static str,
        timeout: Duration,
    ) -> Result<&Self, Error> {
        let retry = RetryConfig {
            timeout,
            poll_interval: self.ctx.config.poll_interval,
        };
        let result = wait::until(retry, {
            let ctx = self.ctx.clone();
            let locator = self.locator.clone();
            let conditions = conditions.clone();
            move || {
                let ctx = ctx.clone();
                let locator = locator.clone();
                let conditions = conditions.clone();
                async move {
                    evaluate::check_element_once(
                        ctx.driver.as_ref(),
                        ctx.config.selector_engine,
                        &locator,
                        &conditions.0,
                        polarity,
                    )
                    .await
                }
            }
        })
        .await;
        match result {
            Ok(()) => Ok(self),
            Err(failure) => Err(evaluate::element_failure(
                failure,
                self.describe(),
                &conditions.0,
                polarity,
                prefix,
                timeout,
            )),
        }
    }

    /// Checks a condition once, without waiting. Resolution failures and
    /// unmet conditions both read as `false`; only non-retryable errors
    /// (an invalid selector, a dead session) surface.
    pub async fn matches(&self, condition: Condition) -> Result<bool, Error> {
        match evaluate::check_element_once(
            self.ctx.driver.as_ref(),
            self.ctx.config.selector_engine,
            &self.locator,
            std::slice::from_ref(&condition),
            Polarity::Should,
        )
        .await
        {
            Outcome::Satisfied(()) => Ok(true),
            Outcome::NotYet(_) => Ok(false),
            Outcome::Fatal(e) => Err(e),
        }
    }

    /// Alias of `matches`, reads better for content checks: `has(text("x"))`.
    pub async fn has(&self, condition: Condition) -> Result<bool, Error> {
        self.matches(condition).await
    }

    /// Whether the element is present right now, without waiting.
    pub async fn exists(&self) -> Result<bool, Error> {
        self.matches(condition::exist()).await
    }

    /// Visible text, waiting for the element to appear first.
    pub async fn text(&self) -> Result<String, Error> {
        Ok(self.read(Read::Text).await?.unwrap_or_default())
    }

    /// Lowercase tag name.
    pub async fn tag_name(&self) -> Result<String, Error> {
        Ok(self.read(Read::TagName).await?.unwrap_or_default())
    }

    pub async fn inner_html(&self) -> Result<String, Error> {
        Ok(self.read(Read::InnerHtml).await?.unwrap_or_default())
    }

    /// Attribute value; `None` when the attribute is absent.
    pub async fn attr(&self, name: &str) -> Result<Option<String>, Error> {
        self.read(Read::Attribute(name.to_string())).await
    }

    /// Current `value` property, which for form fields tracks user input
    /// rather than the markup's initial value.
    pub async fn value(&self) -> Result<Option<String>, Error> {
        self.read(Read::Property("value".to_string())).await
    }

    /// Computed style value, e.g. `css_value("display")`.
    pub async fn css_value(&self, prop: &str) -> Result<String, Error> {
        Ok(self
            .read(Read::CssValue(prop.to_string()))
            .await?
            .unwrap_or_default())
    }

    /// Computed style of a pseudo-element, e.g. `pseudo("::before", "content")`.
    pub async fn pseudo(&self, pseudo_element: &str, prop: &str) -> Result<String, Error> {
        Ok(self
            .read(Read::Pseudo(pseudo_element.to_string(), prop.to_string()))
            .await?
            .unwrap_or_default())
    }

    async fn read(&self, read: Read) -> Result<Option<String>, Error> {
        let retry = RetryConfig {
            timeout: self.ctx.config.timeout,
            poll_interval: self.ctx.config.poll_interval,
        };
        let result = wait::until(retry, {
            let ctx = self.ctx.clone();
            let locator = self.locator.clone();
            let read = read.clone();
            move || {
                let ctx = ctx.clone();
                let locator = locator.clone();
                let read = read.clone();
                async move {
                    evaluate::read_element_once(
                        ctx.driver.as_ref(),
                        ctx.config.selector_engine,
                        &locator,
                        &read,
                    )
                    .await
                }
            }
        })
        .await;
        result.map_err(|failure| {
            evaluate::element_failure(
                failure,
                self.describe(),
                &[condition::exist()],
                Polarity::Should,
                "",
                self.ctx.config.timeout,
            )
        })
    }
}
