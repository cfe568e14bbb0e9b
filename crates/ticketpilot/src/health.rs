//! Health check for the browser automation layer.
//!
//! Verifies that a Chromium binary can actually be launched, which is the one
//! external precondition every automation run depends on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::engine::{BrowserEngine, LaunchOptions};

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything is working correctly
    Healthy,
    /// Browser launches but probing the page failed
    Degraded,
    /// No usable browser
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code for health endpoints
    pub fn to_http_status(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,   // OK
            HealthStatus::Degraded => 206,  // Partial Content
            HealthStatus::Unhealthy => 503, // Service Unavailable
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,

    /// Whether a Chromium binary could be launched
    pub browser_available: bool,

    /// Time taken to perform the health check in milliseconds
    pub check_duration_ms: u64,

    /// Error message if any check failed
    pub error_message: Option<String>,

    /// Additional diagnostics
    pub diagnostics: HashMap<String, serde_json::Value>,
}

/// Launch a throwaway headless browser, evaluate a trivial expression, and
/// tear it down again. Expensive (hundreds of milliseconds); intended for
/// readiness probes, not liveness polling.
pub async fn check_browser_health() -> HealthReport {
    let started = Instant::now();
    let mut diagnostics = HashMap::new();

    let engine = match BrowserEngine::launch(&LaunchOptions::default()).await {
        Ok(engine) => engine,
        Err(e) => {
            return HealthReport {
                status: HealthStatus::Unhealthy,
                browser_available: false,
                check_duration_ms: started.elapsed().as_millis() as u64,
                error_message: Some(format!("Browser launch failed: {e}")),
                diagnostics,
            };
        }
    };

    let probe: Result<i64, _> = engine.evaluate("1 + 1").await;
    let (status, error_message) = match probe {
        Ok(2) => (HealthStatus::Healthy, None),
        Ok(other) => (
            HealthStatus::Degraded,
            Some(format!("Probe evaluation returned unexpected value: {other}")),
        ),
        Err(e) => (
            HealthStatus::Degraded,
            Some(format!("Probe evaluation failed: {e}")),
        ),
    };

    if let Err(e) = engine.close().await {
        diagnostics.insert(
            "close_error".to_string(),
            serde_json::Value::String(e.to_string()),
        );
    }

    HealthReport {
        status,
        browser_available: true,
        check_duration_ms: started.elapsed().as_millis() as u64,
        error_message,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_http_mapping() {
        assert_eq!(HealthStatus::Healthy.to_http_status(), 200);
        assert_eq!(HealthStatus::Degraded.to_http_status(), 206);
        assert_eq!(HealthStatus::Unhealthy.to_http_status(), 503);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }
}
