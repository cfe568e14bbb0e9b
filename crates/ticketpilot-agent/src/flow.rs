//! The helpdesk ticket flow: login, navigate, create, fill, submit, log note.
//!
//! Every interaction point carries an ordered fallback chain of selectors,
//! because the target UI's markup drifts between product versions. The chains
//! are plain data; when the site changes, the fix is a one-list edit.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use ticketpilot::{AutomationError, LaunchOptions, Session};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::popups::dismiss_known_popups;

// Login page
const LOGIN_FIELD: &[&str] = &["#login", "name:login", "input[type='email']"];
const PASSWORD_FIELD: &[&str] = &["#password", "name:password", "input[type='password']"];
const LOGIN_SUBMIT: &[&str] = &[
    "button[type='submit']",
    "button:text:Log in",
    "button:text:Sign in",
];
const LOGIN_ERROR_BANNER: &[&str] = &[".alert-danger", "p.alert", ".o_login_auth_error"];

// Top-level navigation
const HELPDESK_MENU: &[&str] = &[
    "a:text:Helpdesk",
    ".o_app[data-menu-xmlid*='helpdesk']",
    "xpath://a[contains(@href, 'helpdesk')]",
];

// Ticket list / kanban
const NEW_TICKET_BUTTON: &[&str] = &[
    ".o_list_button_add",
    ".o-kanban-button-new",
    "button:text:New",
    "button:text:Create",
];

// Ticket form
const TITLE_FIELD: &[&str] = &[
    "#name_0",
    "input[name='name']",
    "placeholder:Subject",
    "h1 input",
];
const CUSTOMER_FIELD: &[&str] = &[
    "div[name='partner_id'] input",
    "input[name='partner_id']",
    "label:Customer",
];
const CUSTOMER_SUGGESTION: &[&str] = &[
    ".o-autocomplete--dropdown-item a",
    ".o-autocomplete--dropdown-item",
    ".ui-autocomplete .ui-menu-item a",
    "ul.ui-autocomplete li",
];
const DESCRIPTION_FIELD: &[&str] = &[
    "div[name='description'] .odoo-editor-editable",
    "div[name='description'] [contenteditable='true']",
    "textarea[name='description']",
    ".note-editable",
];
const SAVE_BUTTON: &[&str] = &[
    ".o_form_button_save",
    "button[title='Save record']",
    "button:text:Save",
];
const SAVED_MARKER: &[&str] = &[
    ".o_form_saved",
    ".o_last_breadcrumb_item",
    ".breadcrumb-item.active",
];

// Chatter
const LOG_NOTE_BUTTON: &[&str] = &[
    "button:text:Log note",
    "button[name='message_log_note']",
    "a:text:Log note",
];
const NOTE_EDITOR: &[&str] = &[
    ".o-mail-Composer-input",
    "textarea[placeholder*='Log an internal note']",
    "div[aria-label='Log an internal note']",
    ".oe_chatter textarea",
];
const NOTE_SEND_BUTTON: &[&str] = &[
    ".o-mail-Composer-send",
    "button:text:Log",
    ".o_composer_button_send",
];
const NOTE_POSTED_MARKER: &[&str] = &[".o-mail-Message", ".o_thread_message"];

const AUTOCOMPLETE_ATTEMPTS: usize = 3;

/// The result of one automation run, as surfaced over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub steps_completed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<String>,
    pub note_posted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub duration_ms: u64,
}

impl RunOutcome {
    pub fn failure(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            message: message.into(),
            steps_completed: Vec::new(),
            failed_step: None,
            ticket_ref: None,
            note_posted: false,
            screenshot: None,
            duration_ms,
        }
    }
}

/// Drives one browser session through the fixed step sequence.
pub struct HelpdeskFlow {
    config: RunConfig,
    steps_completed: Vec<String>,
    ticket_ref: Option<String>,
    note_posted: bool,
}

impl HelpdeskFlow {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            steps_completed: Vec::new(),
            ticket_ref: None,
            note_posted: false,
        }
    }

    /// Launch a browser, run the flow, and always tear the browser down.
    pub async fn execute(config: RunConfig) -> RunOutcome {
        let started = Instant::now();

        if let Err(message) = config.validate() {
            return RunOutcome::failure(message, started.elapsed().as_millis() as u64);
        }

        let options = LaunchOptions {
            headless: config.headless,
            slow_mo_ms: config.slow_mo_ms,
            ..LaunchOptions::default()
        };
        let session = match Session::launch(options).await {
            Ok(session) => session,
            Err(e) => {
                return RunOutcome::failure(
                    format!("Browser launch failed: {e}"),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let mut flow = Self::new(config);
        let run_result = flow.run_steps(&session).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match run_result {
            Ok(()) => RunOutcome {
                success: true,
                message: format!(
                    "Ticket created{}",
                    if flow.note_posted {
                        " and log note posted"
                    } else {
                        ""
                    }
                ),
                steps_completed: flow.steps_completed.clone(),
                failed_step: None,
                ticket_ref: flow.ticket_ref.clone(),
                note_posted: flow.note_posted,
                screenshot: None,
                duration_ms,
            },
            Err((step, error)) => {
                warn!(step, %error, "Flow step failed");
                let screenshot = flow.capture_failure_screenshot(&session, step).await;
                RunOutcome {
                    success: false,
                    message: format!("Step '{step}' failed: {error}"),
                    steps_completed: flow.steps_completed.clone(),
                    failed_step: Some(step.to_string()),
                    ticket_ref: flow.ticket_ref.clone(),
                    note_posted: flow.note_posted,
                    screenshot,
                    duration_ms,
                }
            }
        };

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {e}");
        }

        outcome
    }

    async fn run_steps(&mut self, session: &Session) -> Result<(), (&'static str, AutomationError)> {
        self.login(session).await.map_err(|e| ("login", e))?;
        self.record("login");

        dismiss_known_popups(session).await;

        self.open_helpdesk(session)
            .await
            .map_err(|e| ("navigate", e))?;
        self.record("navigate");

        dismiss_known_popups(session).await;

        self.create_ticket(session).await.map_err(|e| ("create", e))?;
        self.record("create");

        self.fill_form(session).await.map_err(|e| ("fill", e))?;
        self.record("fill");

        self.submit(session).await.map_err(|e| ("submit", e))?;
        self.record("submit");

        if self.config.log_note.is_some() {
            self.post_log_note(session)
                .await
                .map_err(|e| ("log_note", e))?;
            self.record("log_note");
        } else {
            info!("No log note configured, skipping chatter step");
            self.record("log_note_skipped");
        }

        Ok(())
    }

    fn record(&mut self, step: &str) {
        info!(step, "Step completed");
        self.steps_completed.push(step.to_string());
    }

    fn per_try_timeout(&self) -> Duration {
        // Each fallback candidate gets a slice of the step budget
        Duration::from_millis((self.config.step_timeout_ms / 4).max(1000))
    }

    async fn login(&self, session: &Session) -> Result<(), AutomationError> {
        let login_url = self.config.login_url();
        info!(url = %login_url, user = %self.config.username, "Logging in");
        session.goto(&login_url).await?;

        let per_try = self.per_try_timeout();
        let login_field = session.first_matching(LOGIN_FIELD, per_try).await?;
        login_field.type_text(&self.config.username).await?;

        let password_field = session.first_matching(PASSWORD_FIELD, per_try).await?;
        password_field.type_text(&self.config.password).await?;

        let submit = session.first_matching(LOGIN_SUBMIT, per_try).await?;
        submit.click().await?;
        session.settle().await;

        let url = session.current_url().await?;
        if url.contains("/web/login") {
            // Still on the login page; pull the banner text if one rendered
            let banner = session
                .first_matching(LOGIN_ERROR_BANNER, Duration::from_millis(500))
                .await;
            let detail = match banner {
                Ok(element) => element.text().await.unwrap_or_default(),
                Err(_) => "no error banner found".to_string(),
            };
            return Err(AutomationError::LoginFailed(format!(
                "Still on login page after submit ({detail})"
            )));
        }
        Ok(())
    }

    async fn open_helpdesk(&self, session: &Session) -> Result<(), AutomationError> {
        // Direct URL first; menu click is the fallback for installs that
        // mount the app elsewhere.
        session.goto(&self.config.helpdesk_url()).await?;
        let url = session.current_url().await?;
        if url.to_lowercase().contains("helpdesk") {
            return Ok(());
        }

        info!("Direct helpdesk URL did not land, falling back to menu navigation");
        let menu = session
            .first_matching(HELPDESK_MENU, self.per_try_timeout())
            .await?;
        menu.click().await?;
        session.settle().await;

        let url = session.current_url().await?;
        if url.to_lowercase().contains("helpdesk") {
            Ok(())
        } else {
            Err(AutomationError::UnexpectedPage(format!(
                "Expected a helpdesk view, got {url}"
            )))
        }
    }

    async fn create_ticket(&self, session: &Session) -> Result<(), AutomationError> {
        let new_button = session
            .first_matching(NEW_TICKET_BUTTON, self.per_try_timeout())
            .await?;
        new_button.click().await?;
        session.settle().await;

        // The form is ready once a subject field is reachable
        session
            .first_matching(TITLE_FIELD, self.per_try_timeout())
            .await?;
        Ok(())
    }

    async fn fill_form(&self, session: &Session) -> Result<(), AutomationError> {
        let per_try = self.per_try_timeout();

        let title_field = session.first_matching(TITLE_FIELD, per_try).await?;
        title_field.type_text(&self.config.ticket_title).await?;

        if !self.config.customer.is_empty() {
            self.pick_customer(session).await?;
        }

        if !self.config.description.is_empty() {
            let description_field = session.first_matching(DESCRIPTION_FIELD, per_try).await?;
            // Rich-text editors normalize keystrokes; set the value directly
            description_field.set_value(&self.config.description).await?;
        }

        Ok(())
    }

    /// The many2one autocomplete dance: type, await the dropdown, click the
    /// first suggestion. The dropdown re-renders while suggestions stream in,
    /// so a click can land on a detached node; retry the whole dance.
    async fn pick_customer(&self, session: &Session) -> Result<(), AutomationError> {
        let per_try = self.per_try_timeout();
        let mut last_error = None;

        for attempt in 1..=AUTOCOMPLETE_ATTEMPTS {
            if attempt > 1 {
                info!(attempt, "Retrying customer autocomplete");
            }

            let field = session.first_matching(CUSTOMER_FIELD, per_try).await?;
            field.type_text(&self.config.customer).await?;
            // Suggestions come from an RPC round-trip
            tokio::time::sleep(Duration::from_millis(800)).await;

            let suggestion = match session
                .first_matching(CUSTOMER_SUGGESTION, Duration::from_secs(3))
                .await
            {
                Ok(element) => element,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            match suggestion.click().await {
                Ok(()) => {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, "Suggestion click failed, dropdown likely re-rendered: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AutomationError::ElementNotFound(format!(
                "No autocomplete suggestion appeared for customer \"{}\"",
                self.config.customer
            ))
        }))
    }

    async fn submit(&mut self, session: &Session) -> Result<(), AutomationError> {
        let save = session
            .first_matching(SAVE_BUTTON, self.per_try_timeout())
            .await?;
        save.click().await?;
        session.settle().await;

        // Confirm persistence before declaring victory
        session
            .first_matching(SAVED_MARKER, self.per_try_timeout())
            .await
            .map_err(|e| {
                AutomationError::UnexpectedPage(format!(
                    "No saved-record marker after clicking save: {e}"
                ))
            })?;

        let url = session.current_url().await?;
        self.ticket_ref = extract_ticket_ref(&url);
        if let Some(ticket_ref) = &self.ticket_ref {
            info!(ticket_ref, "Ticket saved");
        }
        Ok(())
    }

    async fn post_log_note(&mut self, session: &Session) -> Result<(), AutomationError> {
        let note = self
            .config
            .log_note
            .clone()
            .unwrap_or_default();
        let per_try = self.per_try_timeout();

        let log_note_button = session.first_matching(LOG_NOTE_BUTTON, per_try).await?;
        log_note_button.click().await?;

        let editor = session.first_matching(NOTE_EDITOR, per_try).await?;
        editor.set_value(&note).await?;

        let send = session.first_matching(NOTE_SEND_BUTTON, per_try).await?;
        send.click().await?;
        session.settle().await;

        session
            .first_matching(NOTE_POSTED_MARKER, per_try)
            .await
            .map_err(|e| {
                AutomationError::ElementNotFound(format!(
                    "Log note did not appear in the thread: {e}"
                ))
            })?;
        self.note_posted = true;
        Ok(())
    }

    async fn capture_failure_screenshot(
        &self,
        session: &Session,
        step: &str,
    ) -> Option<String> {
        let filename = format!("{step}-{}.png", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        let path: PathBuf = self.config.screenshot_dir.join(filename);
        match session.screenshot_to(&path).await {
            Ok(saved) => {
                info!(path = %saved.display(), "Captured failure screenshot");
                Some(saved.display().to_string())
            }
            Err(e) => {
                // Never let a screenshot failure mask the step error
                warn!("Failed to capture failure screenshot: {e}");
                None
            }
        }
    }
}

/// A form URL carries the record id after save, e.g. `.../helpdesk/42` or
/// `...#id=42&...`.
fn extract_ticket_ref(url: &str) -> Option<String> {
    if let Some(fragment) = url.split('#').nth(1) {
        for pair in fragment.split('&') {
            if let Some(id) = pair.strip_prefix("id=") {
                if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
                    return Some(id.to_string());
                }
            }
        }
    }

    let tail: String = url
        .split(&['?', '#'][..])
        .next()
        .unwrap_or(url)
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if tail.is_empty() {
        None
    } else {
        Some(tail.chars().rev().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketpilot::Selector;

    #[test]
    fn test_all_fallback_chains_parse() {
        let chains: &[&[&str]] = &[
            LOGIN_FIELD,
            PASSWORD_FIELD,
            LOGIN_SUBMIT,
            LOGIN_ERROR_BANNER,
            HELPDESK_MENU,
            NEW_TICKET_BUTTON,
            TITLE_FIELD,
            CUSTOMER_FIELD,
            CUSTOMER_SUGGESTION,
            DESCRIPTION_FIELD,
            SAVE_BUTTON,
            SAVED_MARKER,
            LOG_NOTE_BUTTON,
            NOTE_EDITOR,
            NOTE_SEND_BUTTON,
            NOTE_POSTED_MARKER,
        ];
        for chain in chains {
            assert!(!chain.is_empty());
            for candidate in *chain {
                assert!(
                    Selector::from(*candidate).validity_error().is_none(),
                    "candidate does not parse: {candidate}"
                );
            }
        }
    }

    #[test]
    fn test_extract_ticket_ref_from_path() {
        assert_eq!(
            extract_ticket_ref("https://desk.example.com/odoo/helpdesk/42"),
            Some("42".to_string())
        );
        assert_eq!(
            extract_ticket_ref("https://desk.example.com/odoo/helpdesk/42?view=form"),
            Some("42".to_string())
        );
    }

    #[test]
    fn test_extract_ticket_ref_from_fragment() {
        assert_eq!(
            extract_ticket_ref("https://desk.example.com/web#id=77&model=helpdesk.ticket"),
            Some("77".to_string())
        );
    }

    #[test]
    fn test_extract_ticket_ref_absent() {
        assert_eq!(
            extract_ticket_ref("https://desk.example.com/odoo/helpdesk"),
            None
        );
        assert_eq!(extract_ticket_ref(""), None);
    }

    #[test]
    fn test_failure_outcome_shape() {
        let outcome = RunOutcome::failure("nope", 12);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "nope");
        assert_eq!(outcome.duration_ms, 12);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["stepsCompleted"], serde_json::json!([]));
        assert!(json.get("failedStep").is_none());
        assert!(json.get("ticketRef").is_none());
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = RunOutcome {
            success: true,
            message: "ok".into(),
            steps_completed: vec!["login".into()],
            failed_step: None,
            ticket_ref: Some("42".into()),
            note_posted: true,
            screenshot: Some("screenshots/x.png".into()),
            duration_ms: 1000,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["ticketRef"], serde_json::json!("42"));
        assert_eq!(json["notePosted"], serde_json::json!(true));
        assert_eq!(json["durationMs"], serde_json::json!(1000));
    }
}
