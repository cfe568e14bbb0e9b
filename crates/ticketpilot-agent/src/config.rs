//! Per-request run configuration.
//!
//! The original deployment of this service was driven entirely through
//! environment variables, with each HTTP request writing its key/value pairs
//! into the process environment before starting the run. This keeps the same
//! key names and precedence (request value wins over environment), but the
//! merge happens into a request-scoped snapshot, so concurrent requests can
//! never clobber each other.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration bag for one automation run.
#[derive(Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,

    pub ticket_title: String,
    pub customer: String,
    pub description: String,
    pub log_note: Option<String>,

    pub headless: bool,
    pub screenshot_dir: PathBuf,
    pub slow_mo_ms: u64,
    pub step_timeout_ms: u64,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ticket_title", &self.ticket_title)
            .field("customer", &self.customer)
            .field("description", &self.description)
            .field("log_note", &self.log_note)
            .field("headless", &self.headless)
            .field("screenshot_dir", &self.screenshot_dir)
            .field("slow_mo_ms", &self.slow_mo_ms)
            .field("step_timeout_ms", &self.step_timeout_ms)
            .finish()
    }
}

/// Wire names accepted in the `POST /automate` body, with the environment
/// variable each one shadows.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("baseUrl", "HELPDESK_URL"),
    ("username", "HELPDESK_USER"),
    ("password", "HELPDESK_PASSWORD"),
    ("ticketTitle", "TICKET_TITLE"),
    ("customer", "TICKET_CUSTOMER"),
    ("description", "TICKET_DESCRIPTION"),
    ("logNote", "TICKET_LOG_NOTE"),
    ("headless", "HEADLESS"),
    ("screenshotDir", "SCREENSHOT_DIR"),
    ("slowMo", "SLOW_MO_MS"),
    ("stepTimeoutMs", "STEP_TIMEOUT_MS"),
];

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RunConfig {
    /// Build a config from an environment lookup plus request-body overrides.
    ///
    /// `overrides` accepts both the camelCase wire names and the raw
    /// environment variable names; non-scalar values are ignored.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        overrides: &serde_json::Map<String, Value>,
    ) -> Self {
        // Normalize the overrides onto env-var names
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in overrides {
            let Some(text) = value_to_string(value) else {
                continue;
            };
            let env_name = KEY_ALIASES
                .iter()
                .find(|(wire, env)| key == wire || key == env)
                .map(|(_, env)| (*env).to_string());
            if let Some(env_name) = env_name {
                merged.insert(env_name, text);
            }
        }

        let get = |env_name: &str| -> Option<String> {
            merged.get(env_name).cloned().or_else(|| lookup(env_name))
        };

        let headless = get("HEADLESS")
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Self {
            base_url: get("HELPDESK_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            username: get("HELPDESK_USER").unwrap_or_default(),
            password: get("HELPDESK_PASSWORD").unwrap_or_default(),
            ticket_title: get("TICKET_TITLE")
                .unwrap_or_else(|| "Automated ticket".to_string()),
            customer: get("TICKET_CUSTOMER").unwrap_or_default(),
            description: get("TICKET_DESCRIPTION").unwrap_or_default(),
            log_note: get("TICKET_LOG_NOTE").filter(|s| !s.trim().is_empty()),
            headless,
            screenshot_dir: get("SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("screenshots")),
            slow_mo_ms: get("SLOW_MO_MS").and_then(|v| v.parse().ok()).unwrap_or(0),
            step_timeout_ms: get("STEP_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        }
    }

    /// Snapshot the process environment and apply request overrides.
    pub fn from_env(overrides: &serde_json::Map<String, Value>) -> Self {
        Self::from_lookup(|name| std::env::var(name).ok(), overrides)
    }

    /// Reject a run before a browser is launched.
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.base_url.is_empty() {
            missing.push("HELPDESK_URL / baseUrl");
        }
        if self.username.is_empty() {
            missing.push("HELPDESK_USER / username");
        }
        if self.password.is_empty() {
            missing.push("HELPDESK_PASSWORD / password");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Missing required configuration: {}", missing.join(", ")))
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/web/login", self.base_url)
    }

    pub fn helpdesk_url(&self) -> String {
        format!("{}/odoo/helpdesk", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fake_env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    fn overrides(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_env_snapshot_without_overrides() {
        let config = RunConfig::from_lookup(
            fake_env(&[
                ("HELPDESK_URL", "https://desk.example.com/"),
                ("HELPDESK_USER", "bot@example.com"),
                ("HELPDESK_PASSWORD", "hunter2"),
                ("TICKET_TITLE", "Printer on fire"),
            ]),
            &serde_json::Map::new(),
        );
        assert_eq!(config.base_url, "https://desk.example.com");
        assert_eq!(config.username, "bot@example.com");
        assert_eq!(config.ticket_title, "Printer on fire");
        assert!(config.headless);
        assert!(config.log_note.is_none());
    }

    #[test]
    fn test_request_overrides_win() {
        let config = RunConfig::from_lookup(
            fake_env(&[
                ("HELPDESK_URL", "https://desk.example.com"),
                ("TICKET_TITLE", "From env"),
            ]),
            &overrides(json!({
                "ticketTitle": "From request",
                "customer": "Acme Corp",
                "logNote": "Escalated by bot"
            })),
        );
        assert_eq!(config.ticket_title, "From request");
        assert_eq!(config.customer, "Acme Corp");
        assert_eq!(config.log_note.as_deref(), Some("Escalated by bot"));
    }

    #[test]
    fn test_env_style_keys_accepted_in_body() {
        let config = RunConfig::from_lookup(
            fake_env(&[]),
            &overrides(json!({ "TICKET_TITLE": "Raw env key" })),
        );
        assert_eq!(config.ticket_title, "Raw env key");
    }

    #[test]
    fn test_bool_and_number_values_coerced() {
        let config = RunConfig::from_lookup(
            fake_env(&[]),
            &overrides(json!({ "headless": false, "slowMo": 250 })),
        );
        assert!(!config.headless);
        assert_eq!(config.slow_mo_ms, 250);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = RunConfig::from_lookup(
            fake_env(&[]),
            &overrides(json!({ "waitForResponse": true, "banana": "yes" })),
        );
        assert_eq!(config.customer, "");
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let config = RunConfig::from_lookup(fake_env(&[]), &serde_json::Map::new());
        let err = config.validate().unwrap_err();
        assert!(err.contains("HELPDESK_URL"));
        assert!(err.contains("HELPDESK_USER"));
        assert!(err.contains("HELPDESK_PASSWORD"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = RunConfig::from_lookup(
            fake_env(&[("HELPDESK_PASSWORD", "s3cret")]),
            &serde_json::Map::new(),
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_derived_urls() {
        let config = RunConfig::from_lookup(
            fake_env(&[("HELPDESK_URL", "https://desk.example.com")]),
            &serde_json::Map::new(),
        );
        assert_eq!(config.login_url(), "https://desk.example.com/web/login");
        assert_eq!(config.helpdesk_url(), "https://desk.example.com/odoo/helpdesk");
    }
}
