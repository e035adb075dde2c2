use std::sync::Arc;

use crate::collection::ElementsCollection;
use crate::config::Config;
use crate::driver::Driver;
use crate::element::ElementHandle;
use crate::locate::Locator;
use crate::selector::Selector;
use crate::target::TargetSwitcher;

/// Shared state behind every handle: the driver connection plus the wait
/// configuration. Handles keep an `Arc` of this, so they outlive the
/// `Session` value that created them.
pub(crate) struct SessionCtx {
    pub driver: Arc<dyn Driver>,
    pub config: Config,
}

/// Entry point. Pairs a driver connection with a wait configuration and
/// hands out lazy handles; cloning shares both.
#[derive(Clone)]
pub struct Session {
    ctx: Arc<SessionCtx>,
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>, config: Config) -> Self {
        Session {
            ctx: Arc::new(SessionCtx { driver, config }),
        }
    }

    /// Lazy handle to the first element matching `selector`.
    pub fn find(&self, selector: impl Into<Selector>) -> ElementHandle {
        ElementHandle::new(self.ctx.clone(), Locator::find(selector.into()))
    }

    /// Lazy handle to all elements matching `selector`, in document order.
    pub fn find_all(&self, selector: impl Into<Selector>) -> ElementsCollection {
        ElementsCollection::new(self.ctx.clone(), Locator::find_all(selector.into()))
    }

    /// Frame, window, alert and focused-element switching.
    pub fn switch_to(&self) -> TargetSwitcher {
        TargetSwitcher::new(self.ctx.clone())
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.ctx.driver.clone()
    }
}
