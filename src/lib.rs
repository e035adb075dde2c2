//! # webwait
#![allow(clippy::uninlined_format_args)]
//!
//! Condition-waiting element handles for WebDriver automation.
//!
//! Handles are lazy: `find` stores a selector and nothing else, and every
//! `should*` call re-resolves it against the live DOM while polling until
//! the condition holds, the timeout passes, or a non-retryable error
//! surfaces. Dynamic pages need no explicit sleeps; an element that is
//! still rendering, animating or getting replaced simply takes another
//! poll. Failures come back as a single typed [`Error`] carrying the
//! selector description, the unmet condition, the observed value and the
//! configured timeout.
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use webwait::collection::size;
//! use webwait::condition::{text, visible};
//! use webwait::{Config, WebDriverSession};
//!
//! # async fn example() -> Result<(), webwait::Error> {
//! let driver = WebDriverSession::connect("http://localhost:4444").await?;
//! driver.goto("https://example.com/todos").await?;
//!
//! let session = driver.session(Config::default());
//!
//! session.find("#new-todo").should_be(visible()).await?;
//! session.find("#save").should_have(text("Save")).await?;
//! session.find_all("#list li").should_have(size(3)).await?;
//!
//! // Per-call timeout override
//! session
//!     .find(".spinner")
//!     .should_not_be_within(visible(), Duration::from_secs(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Conditions
//!
//! Conditions compose: [`Condition::because`] attaches an explanation to
//! failure messages, [`Condition::negate`] inverts, and several conditions
//! can be passed to one `should` call (all must hold; the first unmet one
//! is reported). Collections have their own condition set under
//! [`collection`], covering sizes and per-element texts.
//!
//! ## Switching targets
//!
//! [`Session::switch_to`] moves the driver's focus between frames, windows
//! and alerts under the same polling rules, so a frame that appears during
//! page load is entered without sleeps.

/// Lazy collection handles and whole-collection conditions
pub mod collection;

/// Element conditions and their combinators
pub mod condition;

/// Wait timeouts, polling interval and selector engine choice
pub mod config;

/// The narrow browser interface the rest of the crate drives
pub mod driver;

/// Lazy single-element handles and `should*` verbs
pub mod element;

/// The typed failure taxonomy
pub mod errors;

/// Page-object schemas mapping field names to handles
pub mod page;

/// CSS and XPath selectors
pub mod selector;

/// Session entry point
pub mod session;

/// Frame, window, alert and focused-element switching
pub mod target;

/// The bounded-time polling loop behind every wait
pub mod wait;

/// WebDriver-backed driver implementation
pub mod webdriver;

mod evaluate;
mod locate;

pub use collection::{CollectionCondition, ElementsCollection, SizeOp};
pub use condition::{Condition, Conditions};
pub use config::{Config, SelectorEngine};
pub use driver::{Driver, DriverError, ElementRef, ScriptArg, WindowRef};
pub use element::ElementHandle;
pub use errors::Error;
pub use page::{PageObject, PageSchema};
pub use selector::Selector;
pub use session::Session;
pub use target::{AlertHandle, TargetSwitcher};
pub use webdriver::WebDriverSession;
