use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::driver::DriverError;
use crate::element::ElementHandle;
use crate::errors::Error;
use crate::evaluate;
use crate::locate::Locator;
use crate::selector::Selector;
use crate::session::SessionCtx;
use crate::wait::{self, Outcome, RetryConfig, WaitFailure};

/// Moves the driver's focus between frames, windows, alerts and the
/// focused element. Lookups poll like element waits do, so a frame that
/// appears during page load is found without explicit sleeps.
pub struct TargetSwitcher {
    ctx: Arc<SessionCtx>,
    timeout: Option<Duration>,
}

/// Handle to an accepted-state alert. Only exposes the prompt text;
/// accepting or dismissing is driver-specific interaction, out of scope
/// for waiting.
pub struct AlertHandle {
    text: String,
}

impl AlertHandle {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Why one switching attempt failed; shows up in poll-loop traces.
struct TargetDiag {
    detail: String,
    cause: Option<DriverError>,
}

impl fmt::Display for TargetDiag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

enum TargetKind {
    Frame,
    Window,
    Alert,
}

/// Whether a failed frame switch is worth retrying. Besides the obvious
/// not-found classes this covers two driver quirks that surface as fatal
/// errors while a frame is still loading: Chrome rejects an index briefly
/// with "invalid argument: 'id' out of range", and Firefox can return a
/// frame id the client cannot decode ("untagged enum FrameId").
fn frame_error_is_transient(e: &DriverError) -> bool {
    match e {
        DriverError::NoSuchFrame(_)
        | DriverError::NoSuchElement(_)
        | DriverError::StaleElement(_) => true,
        DriverError::InvalidArgument(msg) if msg.contains("'id' out of range") => {
            warn!("frame switch rejected as out of range, retrying: {}", msg);
            true
        }
        DriverError::Session(msg) if msg.contains("untagged enum FrameId") => {
            warn!("frame id response not decodable, retrying: {}", msg);
            true
        }
        _ => false,
    }
}

impl TargetSwitcher {
    pub(crate) fn new(ctx: Arc<SessionCtx>) -> Self {
        TargetSwitcher { ctx, timeout: None }
    }

    /// Overrides the session timeout for the lookups on this switcher.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(self.ctx.config.timeout)
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            timeout: self.timeout(),
            poll_interval: self.ctx.config.poll_interval,
        }
    }

    /// Enters the frame at `index`, counted across `frame` and `iframe`
    /// elements in document order.
    pub async fn frame(&self, index: u16) -> Result<(), Error> {
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    match ctx.driver.switch_to_frame_by_index(index).await {
                        Ok(()) => Outcome::Satisfied(()),
                        Err(e) if frame_error_is_transient(&e) => Outcome::NotYet(TargetDiag {
                            detail: format!("no frame at index {}", index),
                            cause: Some(e),
                        }),
                        Err(e) => Outcome::Fatal(Error::Driver(e)),
                    }
                }
            }
        })
        .await;
        self.finish(result, TargetKind::Frame, format!("index: {}", index))
    }

    /// Enters the frame whose `name` or `id` attribute is `name_or_id`.
    pub async fn frame_named(&self, name_or_id: &str) -> Result<(), Error> {
        let selector = Selector::css(format!(
            "frame#{0},frame[name='{0}'],iframe#{0},iframe[name='{0}']",
            name_or_id
        ));
        let locator = Locator::find(selector);
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            let locator = locator.clone();
            let name_or_id = name_or_id.to_string();
            move || {
                let ctx = ctx.clone();
                let locator = locator.clone();
                let name_or_id = name_or_id.clone();
                async move {
                    Self::enter_frame_by_locator(&ctx, &locator, &name_or_id).await
                }
            }
        })
        .await;
        self.finish(
            result,
            TargetKind::Frame,
            format!("name or id: {}", name_or_id),
        )
    }

    /// Enters the frame that `element` points at, re-resolving the handle
    /// on each attempt.
    pub async fn frame_element(&self, element: &ElementHandle) -> Result<(), Error> {
        let description = element.describe();
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            let locator = element.locator().clone();
            let description = description.clone();
            move || {
                let ctx = ctx.clone();
                let locator = locator.clone();
                let description = description.clone();
                async move {
                    Self::enter_frame_by_locator(&ctx, &locator, &description).await
                }
            }
        })
        .await;
        self.finish(result, TargetKind::Frame, description)
    }

    /// Walks a nested frame path from the top of the document, e.g.
    /// `inner_frame(&["outer", "inner"])`. Each step matches by `name` or
    /// `id`; the whole walk restarts on every attempt.
    pub async fn inner_frame(&self, names: &[&str]) -> Result<(), Error> {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            let names = names.clone();
            move || {
                let ctx = ctx.clone();
                let names = names.clone();
                async move {
                    if let Err(e) = ctx.driver.switch_to_default_content().await {
                        return Outcome::Fatal(Error::Driver(e));
                    }
                    for name in &names {
                        let selector = Selector::css(format!(
                            "frame#{0},frame[name='{0}'],iframe#{0},iframe[name='{0}']",
                            name
                        ));
                        let locator = Locator::find(selector);
                        match Self::enter_frame_by_locator(&ctx, &locator, name).await {
                            Outcome::Satisfied(()) => {}
                            other => return other,
                        }
                    }
                    Outcome::Satisfied(())
                }
            }
        })
        .await;
        self.finish(
            result,
            TargetKind::Frame,
            format!("name or id: {}", names.join(".")),
        )
    }

    async fn enter_frame_by_locator(
        ctx: &SessionCtx,
        locator: &Locator,
        description: &str,
    ) -> Outcome<(), TargetDiag> {
        let element = match locator
            .resolve_one(ctx.driver.as_ref(), ctx.config.selector_engine)
            .await
        {
            Ok(element) => element,
            Err(e) if frame_error_is_transient(&e) => {
                return Outcome::NotYet(TargetDiag {
                    detail: format!("no frame element for {}", description),
                    cause: Some(e),
                });
            }
            Err(e) => return Outcome::Fatal(evaluate::fatal_error(locator, e)),
        };
        match ctx.driver.switch_to_frame_by_element(&element).await {
            Ok(()) => Outcome::Satisfied(()),
            Err(e) if frame_error_is_transient(&e) => Outcome::NotYet(TargetDiag {
                detail: format!("could not enter frame {}", description),
                cause: Some(e),
            }),
            Err(e) => Outcome::Fatal(Error::Driver(e)),
        }
    }

    /// Moves focus back to the parent of the current frame. Immediate, no
    /// polling: the parent always exists.
    pub async fn parent_frame(&self) -> Result<(), Error> {
        self.ctx
            .driver
            .switch_to_parent_frame()
            .await
            .map_err(Error::from)
    }

    /// Moves focus back to the top of the document. Immediate.
    pub async fn default_content(&self) -> Result<(), Error> {
        self.ctx
            .driver
            .switch_to_default_content()
            .await
            .map_err(Error::from)
    }

    /// Switches to the window at `index` in the driver's handle order,
    /// waiting for it to open if necessary.
    pub async fn window(&self, index: usize) -> Result<(), Error> {
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    let windows = match ctx.driver.window_handles().await {
                        Ok(windows) => windows,
                        Err(e) => return Outcome::Fatal(Error::Driver(e)),
                    };
                    let window = match windows.get(index) {
                        Some(window) => window,
                        None => {
                            return Outcome::NotYet(TargetDiag {
                                detail: format!(
                                    "only {} window(s) open, wanted index {}",
                                    windows.len(),
                                    index
                                ),
                                cause: None,
                            });
                        }
                    };
                    match ctx.driver.switch_to_window(window).await {
                        Ok(()) => Outcome::Satisfied(()),
                        Err(e @ DriverError::NoSuchWindow(_)) => Outcome::NotYet(TargetDiag {
                            detail: format!("window at index {} closed mid-switch", index),
                            cause: Some(e),
                        }),
                        Err(e) => Outcome::Fatal(Error::Driver(e)),
                    }
                }
            }
        })
        .await;
        self.finish(result, TargetKind::Window, format!("index: {}", index))
    }

    /// Switches to the window whose title or `window.name` equals `target`,
    /// checking each open window in turn. Focus is restored to the current
    /// window when no attempt matches.
    pub async fn window_named(&self, target: &str) -> Result<(), Error> {
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            let target = target.to_string();
            move || {
                let ctx = ctx.clone();
                let target = target.clone();
                async move { Self::find_window_by_name_or_title(&ctx, &target).await }
            }
        })
        .await;
        self.finish(
            result,
            TargetKind::Window,
            format!("name or title: {}", target),
        )
    }

    async fn find_window_by_name_or_title(
        ctx: &SessionCtx,
        target: &str,
    ) -> Outcome<(), TargetDiag> {
        let original = match ctx.driver.current_window().await {
            Ok(original) => original,
            Err(e) => return Outcome::Fatal(Error::Driver(e)),
        };
        let windows = match ctx.driver.window_handles().await {
            Ok(windows) => windows,
            Err(e) => return Outcome::Fatal(Error::Driver(e)),
        };
        let mut last_error = None;
        for window in &windows {
            match ctx.driver.switch_to_window(window).await {
                Ok(()) => {}
                // A window listed a moment ago may have closed since
                Err(e @ DriverError::NoSuchWindow(_)) => {
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Outcome::Fatal(Error::Driver(e)),
            }
            let title = ctx.driver.page_title().await.unwrap_or_default();
            let name = ctx.driver.window_name().await.unwrap_or_default();
            if title == target || name == target {
                return Outcome::Satisfied(());
            }
        }
        // No match; put focus back where it was for the next attempt
        if let Err(e) = ctx.driver.switch_to_window(&original).await {
            if !matches!(e, DriverError::NoSuchWindow(_)) {
                return Outcome::Fatal(Error::Driver(e));
            }
        }
        Outcome::NotYet(TargetDiag {
            detail: format!(
                "none of {} window(s) titled or named {}",
                windows.len(),
                target
            ),
            cause: last_error,
        })
    }

    /// Lazy handle to whichever element currently has focus. Resolution
    /// happens per use, like any other handle.
    pub fn active_element(&self) -> ElementHandle {
        ElementHandle::new(self.ctx.clone(), Locator::active())
    }

    /// Waits for a modal alert, confirm or prompt dialog and returns its
    /// text.
    pub async fn alert(&self) -> Result<AlertHandle, Error> {
        let result = wait::until(self.retry_config(), {
            let ctx = self.ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    match ctx.driver.alert_text().await {
                        Ok(text) => Outcome::Satisfied(AlertHandle { text }),
                        Err(e @ DriverError::NoSuchAlert(_)) => Outcome::NotYet(TargetDiag {
                            detail: "no alert open".to_string(),
                            cause: Some(e),
                        }),
                        Err(e) => Outcome::Fatal(Error::Driver(e)),
                    }
                }
            }
        })
        .await;
        self.finish(result, TargetKind::Alert, String::new())
    }

    fn finish<T>(
        &self,
        result: Result<T, WaitFailure<TargetDiag>>,
        kind: TargetKind,
        description: String,
    ) -> Result<T, Error> {
        match result {
            Ok(value) => Ok(value),
            Err(WaitFailure::Fatal(error)) => Err(error),
            Err(WaitFailure::TimedOut { last, .. }) => Err(match kind {
                TargetKind::Frame => Error::FrameNotFound {
                    description,
                    timeout: self.timeout(),
                    cause: last.cause,
                },
                TargetKind::Window => Error::WindowNotFound {
                    description,
                    timeout: self.timeout(),
                    cause: last.cause,
                },
                TargetKind::Alert => Error::AlertNotFound {
                    timeout: self.timeout(),
                    cause: last.cause,
                },
            }),
        }
    }
}
