use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Script evaluation failed: {0}")]
    ScriptError(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Unexpected page: {0}")]
    UnexpectedPage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutomationError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_)
                | AutomationError::Timeout(_)
                | AutomationError::ScriptError(_)
        )
    }
}
