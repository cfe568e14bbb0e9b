//! In-memory job records for asynchronous polling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::flow::RunOutcome;

/// Finished jobs older than this are dropped.
const RETENTION_SECS: i64 = 3600;
/// Hard cap on retained records; oldest finished jobs go first.
const MAX_RECORDS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunOutcome>,
}

/// Shared, mutex-guarded job table.
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<Mutex<HashMap<Uuid, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new queued job and return its id.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let record = JobRecord {
            job_id: id,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
        };
        let mut jobs = self.lock();
        jobs.insert(id, record);
        Self::prune_locked(&mut jobs);
        id
    }

    pub fn mark_running(&self, id: Uuid) {
        let mut jobs = self.lock();
        if let Some(record) = jobs.get_mut(&id) {
            record.status = JobStatus::Running;
            record.started_at = Some(Utc::now());
        }
    }

    /// Record the outcome and flip the job to its terminal status.
    pub fn complete(&self, id: Uuid, outcome: RunOutcome) {
        let mut jobs = self.lock();
        if let Some(record) = jobs.get_mut(&id) {
            record.status = if outcome.success {
                JobStatus::Succeeded
            } else {
                JobStatus::Failed
            };
            record.finished_at = Some(Utc::now());
            record.result = Some(outcome);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        let mut jobs = self.lock();
        Self::prune_locked(&mut jobs);
        jobs.get(&id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JobRecord>> {
        // A poisoned job table only means a panicking run; the records stay usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prune_locked(jobs: &mut HashMap<Uuid, JobRecord>) {
        let cutoff = Utc::now() - ChronoDuration::seconds(RETENTION_SECS);
        jobs.retain(|_, record| {
            !(record.status.is_terminal()
                && record.finished_at.map(|t| t < cutoff).unwrap_or(false))
        });

        if jobs.len() > MAX_RECORDS {
            let mut finished: Vec<(Uuid, DateTime<Utc>)> = jobs
                .values()
                .filter(|r| r.status.is_terminal())
                .map(|r| (r.job_id, r.finished_at.unwrap_or(r.created_at)))
                .collect();
            finished.sort_by_key(|(_, t)| *t);
            let excess = jobs.len().saturating_sub(MAX_RECORDS);
            for (id, _) in finished.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool) -> RunOutcome {
        RunOutcome {
            success,
            message: if success { "ok" } else { "boom" }.to_string(),
            steps_completed: Vec::new(),
            failed_step: None,
            ticket_ref: None,
            note_posted: false,
            screenshot: None,
            duration_ms: 42,
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let store = JobStore::new();
        let id = store.create();

        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert!(record.started_at.is_none());

        store.mark_running(id);
        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.started_at.is_some());

        store.complete(id, outcome(true));
        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert!(record.finished_at.is_some());
        assert!(record.result.unwrap().success);
    }

    #[test]
    fn test_failed_outcome_maps_to_failed_status() {
        let store = JobStore::new();
        let id = store.create();
        store.complete(id, outcome(false));
        assert_eq!(store.get(id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_unknown_job_is_none() {
        let store = JobStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_active_count_ignores_terminal_jobs() {
        let store = JobStore::new();
        let a = store.create();
        let _b = store.create();
        assert_eq!(store.active_count(), 2);
        store.complete(a, outcome(true));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_record_cap_drops_oldest_finished() {
        let store = JobStore::new();
        let mut first_finished = None;
        for i in 0..(MAX_RECORDS + 10) {
            let id = store.create();
            store.complete(id, outcome(true));
            if i == 0 {
                first_finished = Some(id);
            }
        }
        assert!(store.get(first_finished.unwrap()).is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }
}
