use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use tracing::{debug, warn};

use crate::engine::HANDLE_ATTR;
use crate::errors::AutomationError;

/// A resolved DOM element.
///
/// Wraps the CDP element handle together with the `data-tp-handle` tag the
/// resolver stamped on the node, so actions that CDP struggles with (clicks
/// swallowed by overlays, framework-managed inputs) can fall back to in-page
/// JS addressing the same node.
pub struct WebElement {
    inner: Element,
    page: Page,
    handle: String,
    selector: String,
}

impl std::fmt::Debug for WebElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebElement")
            .field("selector", &self.selector)
            .field("handle", &self.handle)
            .finish()
    }
}

impl WebElement {
    pub(crate) fn new(inner: Element, page: Page, handle: String, selector: String) -> Self {
        Self {
            inner,
            page,
            handle,
            selector,
        }
    }

    /// The selector string this element was resolved from.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    fn self_js(&self, body: &str) -> String {
        format!(
            "(() => {{ const el = document.querySelector('[{HANDLE_ATTR}=\"{}\"]'); if (!el) return null; {body} }})()",
            self.handle
        )
    }

    async fn eval_on_self<T: serde::de::DeserializeOwned>(
        &self,
        body: &str,
    ) -> Result<T, AutomationError> {
        self.page
            .evaluate(self.self_js(body))
            .await
            .map_err(|e| AutomationError::ScriptError(e.to_string()))?
            .into_value()
            .map_err(|e| AutomationError::ScriptError(format!("Failed to decode result: {e}")))
    }

    /// Click the element. Scrolls it into view first; if the CDP click is
    /// rejected (covered by an overlay, zero-size hit target) falls back to
    /// a synthetic in-page click.
    pub async fn click(&self) -> Result<(), AutomationError> {
        if let Err(e) = self.inner.scroll_into_view().await {
            debug!(selector = %self.selector, "scroll_into_view failed: {e}");
        }
        match self.inner.click().await {
            Ok(_) => {
                debug!(selector = %self.selector, "Clicked");
                Ok(())
            }
            Err(e) => {
                warn!(selector = %self.selector, "CDP click failed ({e}), falling back to JS click");
                let clicked: bool = self
                    .eval_on_self("el.click(); return true;")
                    .await
                    .map_err(|js_err| {
                        AutomationError::BrowserError(format!(
                            "Click failed for {}: {e} (JS fallback: {js_err})",
                            self.selector
                        ))
                    })?;
                if clicked {
                    Ok(())
                } else {
                    Err(AutomationError::ElementNotFound(format!(
                        "Element detached before JS click: {}",
                        self.selector
                    )))
                }
            }
        }
    }

    /// Focus the element, clear any existing value, and type `text` as
    /// keystrokes.
    pub async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.inner
            .focus()
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Focus failed: {e}")))?;
        self.clear().await?;
        self.inner
            .type_str(text)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Typing failed: {e}")))?;
        debug!(selector = %self.selector, chars = text.len(), "Typed text");
        Ok(())
    }

    /// Clear the element's current value (inputs and contenteditable alike).
    pub async fn clear(&self) -> Result<(), AutomationError> {
        let _: bool = self
            .eval_on_self(
                "if ('value' in el) { el.value = ''; } \
                 else if (el.isContentEditable) { el.innerHTML = ''; } \
                 el.dispatchEvent(new Event('input', { bubbles: true })); \
                 return true;",
            )
            .await?;
        Ok(())
    }

    /// Set the value directly and fire the synthetic events JS frameworks
    /// listen for. Use for inputs that normalize or reject raw keystrokes.
    pub async fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        let literal = serde_json::to_string(value)
            .map_err(|e| AutomationError::Internal(format!("Failed to encode value: {e}")))?;
        let _: bool = self
            .eval_on_self(&format!(
                "if ('value' in el) {{ el.value = {literal}; }} \
                 else if (el.isContentEditable) {{ el.textContent = {literal}; }} \
                 else {{ return false; }} \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 return true;"
            ))
            .await?;
        debug!(selector = %self.selector, "Set value");
        Ok(())
    }

    /// Press a single key (e.g. `Enter`, `Escape`, `Tab`).
    pub async fn press_key(&self, key: &str) -> Result<(), AutomationError> {
        self.inner
            .press_key(key)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Key press '{key}' failed: {e}")))?;
        Ok(())
    }

    /// The element's trimmed visible text.
    pub async fn text(&self) -> Result<String, AutomationError> {
        let text: Option<String> = self
            .eval_on_self("return (el.textContent || '').trim();")
            .await?;
        Ok(text.unwrap_or_default())
    }

    /// Read an attribute value.
    pub async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.inner
            .attribute(name)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("Attribute read failed: {e}")))
    }

    /// Whether the element currently occupies space on screen.
    pub async fn is_visible(&self) -> Result<bool, AutomationError> {
        let visible: Option<bool> = self
            .eval_on_self(
                "return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);",
            )
            .await?;
        Ok(visible.unwrap_or(false))
    }
}
