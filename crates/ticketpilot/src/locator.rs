use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::element::WebElement;
use crate::engine::BrowserEngine;
use crate::errors::AutomationError;
use crate::selector::Selector;

// Default timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A high-level API for finding and interacting with DOM elements.
///
/// Resolution is repeated against the live page until it succeeds or the
/// timeout passes, so locators tolerate late-rendering UI.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<BrowserEngine>,
    selector: Selector,
    timeout: Duration, // Default timeout for this locator instance
}

impl Locator {
    pub(crate) fn new(engine: Arc<BrowserEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
        }
    }

    /// Set a default timeout for waiting operations on this locator instance.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn selector_string(&self) -> String {
        format!("{:?}", self.selector)
    }

    /// Wait for an element matching the locator to appear, up to the
    /// specified timeout. If no timeout is provided, uses the locator's
    /// default timeout.
    #[instrument(level = "debug", skip(self, timeout))]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<WebElement, AutomationError> {
        debug!("Waiting for element matching selector: {:?}", self.selector);
        let effective_timeout = timeout.unwrap_or(self.timeout);
        let deadline = tokio::time::Instant::now() + effective_timeout;

        let mut last_error = None;
        loop {
            match self.engine.resolve(&self.selector).await {
                Ok(element) => return Ok(element),
                // Bad selectors and dead browsers won't improve with polling
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => last_error = Some(e),
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let inner_msg = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no resolution attempted".to_string());
        Err(AutomationError::Timeout(format!(
            "Timed out after {effective_timeout:?} waiting for element {:?}. Original error: {inner_msg}",
            self.selector
        )))
    }

    pub async fn first(&self, timeout: Option<Duration>) -> Result<WebElement, AutomationError> {
        self.wait(timeout).await
    }

    /// Get all elements currently matching this locator, without waiting.
    pub async fn all(&self) -> Result<Vec<WebElement>, AutomationError> {
        match self.engine.resolve_all(&self.selector, None).await {
            Ok(elements) => Ok(elements),
            Err(AutomationError::ElementNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Single non-waiting probe for presence.
    pub async fn exists(&self) -> Result<bool, AutomationError> {
        match self.engine.resolve(&self.selector).await {
            Ok(_) => Ok(true),
            Err(AutomationError::ElementNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a nested locator scoped within this one.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        let mut chain = match self.selector.clone() {
            Selector::Chain(existing) => existing,
            s => vec![s],
        };
        match selector.into() {
            Selector::Chain(mut parts) => chain.append(&mut parts),
            s => chain.push(s),
        }
        Locator {
            engine: self.engine.clone(),
            selector: Selector::Chain(chain),
            timeout: self.timeout,
        }
    }
}
