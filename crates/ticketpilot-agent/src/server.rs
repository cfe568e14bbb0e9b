//! The HTTP wrapper around the automation flow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::flow::{HelpdeskFlow, RunOutcome};
use crate::jobs::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobStore,
    /// One permit per allowed live browser session.
    pub run_permits: Arc<Semaphore>,
    pub active_runs: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(max_concurrent_runs: usize) -> Self {
        Self {
            jobs: JobStore::new(),
            run_permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            active_runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/automate", post(automate))
        .route("/status/{job_id}", get(job_status))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

/// `waitForResponse` selects synchronous mode; workflow tools send it as a
/// bool or as the string `"true"`.
fn wants_sync_response(body: &serde_json::Map<String, Value>) -> bool {
    match body.get("waitForResponse") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

async fn run_with_permit(state: &AppState, job_id: Option<Uuid>, config: RunConfig) -> RunOutcome {
    // Acquire failure only happens when the semaphore is closed, i.e. shutdown
    let _permit = match state.run_permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return RunOutcome::failure("Server is shutting down", 0);
        }
    };
    // A job stays queued while it waits for a permit; it is only running
    // once one is held.
    if let Some(job_id) = job_id {
        state.jobs.mark_running(job_id);
    }
    state.active_runs.fetch_add(1, Ordering::SeqCst);
    let outcome = HelpdeskFlow::execute(config).await;
    state.active_runs.fetch_sub(1, Ordering::SeqCst);
    outcome
}

async fn automate(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let Some(params) = body.as_object() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Request body must be a JSON object of key/value pairs"
            })),
        )
            .into_response();
    };

    let config = RunConfig::from_env(params);

    if wants_sync_response(params) {
        if let Err(message) = config.validate() {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response();
        }

        info!(config = ?config, "Starting synchronous automation run");
        let outcome = run_with_permit(&state, None, config).await;
        let code = if outcome.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return (code, Json(outcome)).into_response();
    }

    // Asynchronous mode: return a job id immediately, run in the background.
    // Validation failures still become pollable (failed) job records.
    let job_id = state.jobs.create();
    let job_state = state.clone();
    tokio::spawn(async move {
        if let Err(reason) = config.validate() {
            error!(%job_id, %reason, "Rejecting automation job");
            job_state
                .jobs
                .complete(job_id, RunOutcome::failure(reason, 0));
            return;
        }
        info!(%job_id, config = ?config, "Starting background automation run");
        let outcome = run_with_permit(&job_state, Some(job_id), config).await;
        job_state.jobs.complete(job_id, outcome);
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "jobId": job_id,
            "status": "queued",
            "statusUrl": format!("/status/{job_id}"),
        })),
    )
        .into_response()
}

async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown job id: {job_id}") })),
        )
            .into_response()
    };

    let Ok(id) = Uuid::parse_str(&job_id) else {
        return not_found();
    };
    match state.jobs.get(id) {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => not_found(),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Lightweight liveness check; does not touch the browser
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "activeRuns": state.active_runs.load(Ordering::SeqCst),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

async fn ready() -> impl IntoResponse {
    use ticketpilot::health::check_browser_health;

    // Deep readiness check: launches a throwaway browser. Expensive, meant
    // for pre-deployment validation rather than frequent polling.
    let report = check_browser_health().await;
    let code = StatusCode::from_u16(report.status.to_http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        code,
        Json(json!({
            "browser": report,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "name": "TicketPilot Agent",
            "description": "Helpdesk ticket automation over headless Chromium",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "/": "This endpoint - lists available endpoints",
                "/automate": "POST - start an automation run (waitForResponse=true for synchronous mode)",
                "/status/{jobId}": "GET - poll a background run",
                "/health": "GET - liveness check",
                "/ready": "GET - deep readiness check (launches a browser)"
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState::new(1)
    }

    #[test]
    fn test_wants_sync_response_variants() {
        let parse = |v: Value| v.as_object().cloned().unwrap();
        assert!(wants_sync_response(&parse(
            json!({ "waitForResponse": true })
        )));
        assert!(wants_sync_response(&parse(
            json!({ "waitForResponse": "true" })
        )));
        assert!(wants_sync_response(&parse(
            json!({ "waitForResponse": "TRUE" })
        )));
        assert!(!wants_sync_response(&parse(
            json!({ "waitForResponse": false })
        )));
        assert!(!wants_sync_response(&parse(
            json!({ "waitForResponse": "yes" })
        )));
        assert!(!wants_sync_response(&parse(json!({}))));
    }

    #[tokio::test]
    async fn test_automate_rejects_non_object_body() {
        let response = automate(State(test_state()), Json(json!("not an object"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_job_status_unknown_id_is_404() {
        let response = job_status(
            State(test_state()),
            Path(Uuid::new_v4().to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_status_malformed_id_is_404() {
        let response = job_status(State(test_state()), Path("not-a-uuid".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_status_returns_record() {
        let state = test_state();
        let id = state.jobs.create();
        let response = job_status(State(state), Path(id.to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_job_waiting_on_permit_stays_queued() {
        let state = test_state();
        // Occupy the single permit so the job has to wait behind it
        let permit = state
            .run_permits
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore open");

        let job_id = state.jobs.create();
        let task_state = state.clone();
        let config = RunConfig::from_lookup(|_| None, &serde_json::Map::new());
        let task = tokio::spawn(async move {
            run_with_permit(&task_state, Some(job_id), config).await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(state.jobs.get(job_id).unwrap().status, JobStatus::Queued);

        task.abort();
        drop(permit);
    }

    #[tokio::test]
    async fn test_health_is_ok() {
        let response = health(State(test_state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
