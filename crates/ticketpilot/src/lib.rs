//! Web UI automation through headless Chromium
//!
//! This crate provides a Playwright-style API for scripting web applications
//! over the Chrome DevTools protocol: typed selectors with a string DSL,
//! locators with bounded wait/retry, and element actions with in-page JS
//! fallbacks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub mod element;
pub mod engine;
pub mod errors;
pub mod health;
pub mod locator;
pub mod selector;

pub use element::WebElement;
pub use engine::{BrowserEngine, LaunchOptions};
pub use errors::AutomationError;
pub use locator::Locator;
pub use selector::Selector;

/// The main entry point: one live browser session.
pub struct Session {
    engine: Arc<BrowserEngine>,
}

impl Session {
    /// Launch a browser with the given options.
    #[instrument(skip(options))]
    pub async fn launch(options: LaunchOptions) -> Result<Self, AutomationError> {
        let engine = BrowserEngine::launch(&options).await?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Launch a headless browser with default options.
    pub async fn launch_default() -> Result<Self, AutomationError> {
        Self::launch(LaunchOptions::default()).await
    }

    /// Navigate the active page and wait for it to settle.
    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.engine.goto(url).await
    }

    /// Re-run the post-navigation settle delay, for in-page transitions that
    /// don't trigger a navigation.
    pub async fn settle(&self) {
        self.engine.settle().await
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        self.engine.current_url().await
    }

    pub async fn content(&self) -> Result<String, AutomationError> {
        self.engine.content().await
    }

    /// Evaluate a JS expression in the page.
    pub async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T, AutomationError> {
        self.engine.evaluate(script).await
    }

    pub async fn set_cookie(
        &self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), AutomationError> {
        self.engine.set_cookie(name, value, domain).await
    }

    #[instrument(skip(self, selector))]
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
    }

    /// Try a fallback chain of selector candidates in order, returning the
    /// first that resolves within `per_try_timeout`.
    ///
    /// This is the primitive the UI flows are built on: markup drifts between
    /// product versions, so every interaction point carries an ordered list
    /// of known shapes.
    #[instrument(level = "debug", skip(self, candidates, per_try_timeout))]
    pub async fn first_matching(
        &self,
        candidates: &[&str],
        per_try_timeout: Duration,
    ) -> Result<WebElement, AutomationError> {
        for (i, candidate) in candidates.iter().enumerate() {
            match self.locator(*candidate).wait(Some(per_try_timeout)).await {
                Ok(element) => {
                    debug!(candidate, attempt = i + 1, "Selector candidate matched");
                    return Ok(element);
                }
                Err(AutomationError::InvalidSelector(reason)) => {
                    // A malformed candidate is a programming error, not drift
                    return Err(AutomationError::InvalidSelector(format!(
                        "Candidate \"{candidate}\": {reason}"
                    )));
                }
                Err(e) => {
                    debug!(candidate, "Selector candidate missed: {e}");
                }
            }
        }
        warn!(tried = candidates.len(), "All selector candidates missed");
        Err(AutomationError::ElementNotFound(format!(
            "No element matched any of the candidates: [{}]",
            candidates.join(", ")
        )))
    }

    /// Capture a full-page PNG screenshot to `path`.
    pub async fn screenshot_to(&self, path: &Path) -> Result<PathBuf, AutomationError> {
        self.engine.screenshot_to(path).await
    }

    /// Close the browser. The session is unusable afterwards.
    pub async fn close(self) -> Result<(), AutomationError> {
        self.engine.close().await
    }
}
