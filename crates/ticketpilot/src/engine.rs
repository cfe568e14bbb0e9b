//! Chromium engine driven over the DevTools protocol.
//!
//! Every selector kind is resolved in-page: a generated JS snippet finds the
//! matching nodes and tags them with a unique `data-tp-handle` attribute, and
//! the element is then re-acquired through CDP by that attribute. This gives
//! CSS, XPath, and text selectors one uniform resolution path.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::element::WebElement;
use crate::errors::AutomationError;
use crate::selector::Selector;

/// Attribute used to hand resolved nodes back from page JS to CDP.
pub(crate) const HANDLE_ATTR: &str = "data-tp-handle";

// Pages driven by JS frameworks keep mutating after load; give them a beat.
const POST_NAVIGATION_SETTLE: Duration = Duration::from_millis(1500);

/// Options controlling browser launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra milliseconds slept after each navigation, on top of the settle delay.
    pub slow_mo_ms: u64,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1440,
            window_height: 900,
            slow_mo_ms: 0,
        }
    }
}

/// Owns the Chromium process, its CDP event handler task, and the active page.
pub struct BrowserEngine {
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: Page,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    slow_mo_ms: u64,
}

impl BrowserEngine {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, AutomationError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox") // Required for containerized environments
            .arg("--disable-dev-shm-usage") // Avoid /dev/shm size issues in containers
            .arg("--disable-gpu")
            .window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| AutomationError::BrowserError(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // Drain CDP events until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to open page: {e}")))?;

        debug!(headless = options.headless, "Browser launched");

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            page,
            handler_task: std::sync::Mutex::new(Some(handler_task)),
            slow_mo_ms: options.slow_mo_ms,
        })
    }

    /// Navigate and wait for the page to settle.
    pub async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        debug!(url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| AutomationError::NavigationError(format!("goto {url}: {e}")))?;
        self.settle().await;
        Ok(())
    }

    /// Sleep out the post-navigation settle window (plus configured slow-mo).
    pub async fn settle(&self) {
        tokio::time::sleep(POST_NAVIGATION_SETTLE + Duration::from_millis(self.slow_mo_ms)).await;
    }

    pub async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to read URL: {e}")))?
            .unwrap_or_default())
    }

    pub async fn content(&self) -> Result<String, AutomationError> {
        self.page
            .content()
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to read page content: {e}")))
    }

    /// Evaluate a JS expression in the page and deserialize the result.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T, AutomationError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| AutomationError::ScriptError(e.to_string()))?
            .into_value()
            .map_err(|e| AutomationError::ScriptError(format!("Failed to decode result: {e}")))
    }

    pub async fn set_cookie(
        &self,
        name: &str,
        value: &str,
        domain: &str,
    ) -> Result<(), AutomationError> {
        let cookie = CookieParam::builder()
            .name(name)
            .value(value)
            .domain(domain)
            .path("/")
            .secure(true)
            .build()
            .map_err(|e| AutomationError::BrowserError(format!("Failed to build cookie: {e}")))?;
        self.page
            .set_cookie(cookie)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Failed to set cookie: {e}")))?;
        Ok(())
    }

    /// Resolve a selector to its first match.
    pub async fn resolve(&self, selector: &Selector) -> Result<WebElement, AutomationError> {
        let mut matches = self.resolve_all(selector, Some(1)).await?;
        matches.pop().ok_or_else(|| {
            AutomationError::ElementNotFound(format!("No element matched selector {selector}"))
        })
    }

    /// Resolve a selector to every current match (up to `limit`, if given).
    pub async fn resolve_all(
        &self,
        selector: &Selector,
        limit: Option<usize>,
    ) -> Result<Vec<WebElement>, AutomationError> {
        if let Some(reason) = selector.validity_error() {
            return Err(AutomationError::InvalidSelector(reason.to_string()));
        }

        let handle_id = uuid::Uuid::new_v4().simple().to_string();
        let script = build_resolver_js(selector, &handle_id)?;
        let count: i64 = self.evaluate(&script).await?;
        if count == 0 {
            return Err(AutomationError::ElementNotFound(format!(
                "No element matched selector {selector}"
            )));
        }

        let take = limit.unwrap_or(count as usize).min(count as usize);
        let mut elements = Vec::with_capacity(take);
        for i in 0..take {
            let handle = format!("{handle_id}-{i}");
            let css = format!("[{HANDLE_ATTR}=\"{handle}\"]");
            let inner = self.page.find_element(css).await.map_err(|e| {
                AutomationError::ElementNotFound(format!(
                    "Tagged element vanished before acquisition ({selector}): {e}"
                ))
            })?;
            elements.push(WebElement::new(
                inner,
                self.page.clone(),
                handle,
                selector.to_string(),
            ));
        }
        Ok(elements)
    }

    /// Capture a full-page PNG to `path`.
    pub async fn screenshot_to(&self, path: &Path) -> Result<PathBuf, AutomationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.page
            .save_screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
                path,
            )
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Screenshot failed: {e}")))?;
        debug!(path = %path.display(), "Captured screenshot");
        Ok(path.to_path_buf())
    }

    /// Close the browser and join the handler task. Idempotent.
    pub async fn close(&self) -> Result<(), AutomationError> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser did not close cleanly: {e}");
            }
        }
        let task = self.handler_task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        Ok(())
    }
}

fn js_string(s: &str) -> String {
    // serde_json produces a quoted, escaped JS string literal
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Lower one chain segment to a JS transform over the current match list.
fn segment_js(segment: &Selector) -> Result<String, AutomationError> {
    match segment {
        Selector::Css(q) => Ok(format!(
            "matches = matches.flatMap((root) => Array.from(root.querySelectorAll({})));",
            js_string(q)
        )),
        Selector::Name(name) => Ok(format!(
            "matches = matches.flatMap((root) => Array.from(root.querySelectorAll({})));",
            js_string(&format!("[name=\"{name}\"]"))
        )),
        Selector::Placeholder(text) => Ok(format!(
            "matches = matches.flatMap((root) => Array.from(root.querySelectorAll({})));",
            js_string(&format!("[placeholder=\"{text}\"]"))
        )),
        Selector::XPath(q) => Ok(format!(
            "matches = matches.flatMap((root) => {{ \
               const out = []; \
               const r = document.evaluate({}, root === document ? document : root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
               for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
               return out; \
             }});",
            js_string(q)
        )),
        Selector::Text { tag, text } => {
            let tag_query = js_string(tag.as_deref().unwrap_or("*"));
            Ok(format!(
                "matches = innermost(matches.flatMap((root) => \
                   Array.from(root.querySelectorAll({tag_query})) \
                     .filter((el) => (el.textContent || '').trim().includes({}))));",
                js_string(text)
            ))
        }
        Selector::Label(text) => Ok(format!(
            "matches = matches.flatMap((root) => \
               Array.from(root.querySelectorAll('label')) \
                 .filter((el) => (el.textContent || '').trim().includes({})) \
                 .map((lb) => lb.htmlFor ? document.getElementById(lb.htmlFor) : lb.querySelector('input, textarea, select')) \
                 .filter(Boolean));",
            js_string(text)
        )),
        Selector::Visible(wanted) => Ok(format!(
            "matches = matches.filter((el) => isVisible(el) === {wanted});"
        )),
        Selector::Nth(n) => Ok(format!("matches = matches.slice({n}, {n} + 1);")),
        Selector::Chain(_) => Err(AutomationError::InvalidSelector(
            "Nested selector chains are not supported".to_string(),
        )),
        Selector::Invalid(reason) => Err(AutomationError::InvalidSelector(reason.clone())),
    }
}

/// Build the in-page resolver: finds matches, tags each with
/// `data-tp-handle="{id}-{index}"`, returns the match count.
fn build_resolver_js(selector: &Selector, handle_id: &str) -> Result<String, AutomationError> {
    let mut body = String::new();
    for segment in selector.segments() {
        body.push_str(&segment_js(&segment)?);
        body.push('\n');
    }
    Ok(format!(
        "(() => {{\n\
           const isVisible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);\n\
           const innermost = (nodes) => nodes.filter((m) => !nodes.some((o) => o !== m && m.contains(o)));\n\
           let matches = [document];\n\
           {body}\
           matches = matches.filter((el) => el && el.setAttribute);\n\
           matches.forEach((el, i) => el.setAttribute('{HANDLE_ATTR}', {} + '-' + i));\n\
           return matches.length;\n\
         }})()",
        js_string(handle_id)
    ))
}
