//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use ironrelay_core::types::JobId;

use super::status::JobStatus;

/// Arguments a job was enqueued with.
///
/// Stored as `{"args": [...], "kwargs": {...}}` and never modified after
/// the job is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl JobPayload {
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Positional argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Named argument `key`, if present.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Registered handler name.
    pub name: String,
    /// Enqueue arguments.
    #[sqlx(json)]
    pub payload: JobPayload,
    /// Current job status.
    pub status: JobStatus,
    /// Higher values are claimed first.
    pub priority: i32,
    /// The job is not eligible before this instant.
    pub scheduled_at: DateTime<Utc>,
    /// Failed executions so far.
    pub attempts: i32,
    /// Failure budget.
    pub max_attempts: i32,
    /// Message of the most recent failure, empty if none.
    pub last_error: String,
    /// When the current or last claim happened.
    pub locked_at: Option<DateTime<Utc>>,
    /// Identity of the worker that claimed the job.
    pub locked_by: String,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Materialize a new pending job.
    pub fn from_new(new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            name: new.name,
            payload: new.payload,
            status: JobStatus::Pending,
            priority: new.priority,
            scheduled_at: new.scheduled_at,
            attempts: 0,
            max_attempts: new.max_attempts,
            last_error: String::new(),
            locked_at: None,
            locked_by: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the job may be claimed at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }

    pub fn mark_running(&mut self, worker: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.locked_at = Some(now);
        self.locked_by = worker.to_string();
        self.updated_at = now;
    }

    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Success;
        self.updated_at = now;
    }

    /// Count a failed execution. Status is resolved separately by the retry policy.
    pub fn record_failure(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.attempts = (self.attempts + 1).min(self.max_attempts.max(1));
        self.last_error = message.into();
        self.updated_at = now;
    }

    /// Put the job back in the queue, eligible from `at`.
    ///
    /// The lock fields keep naming the worker that ran the failed attempt.
    pub fn reschedule(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.scheduled_at = at;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.updated_at = now;
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Cancelled;
        self.updated_at = now;
    }

    /// Operator reset of a failed job: fresh budget, eligible immediately.
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.attempts = 0;
        self.last_error.clear();
        self.scheduled_at = now;
        self.locked_at = None;
        self.locked_by.clear();
        self.updated_at = now;
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Client-generated identifier, known before the job is persisted.
    pub id: JobId,
    /// Registered handler name.
    pub name: String,
    /// Enqueue arguments.
    pub payload: JobPayload,
    /// Priority.
    pub priority: i32,
    /// Earliest execution time.
    pub scheduled_at: DateTime<Utc>,
    /// Failure budget.
    pub max_attempts: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(max_attempts: i32) -> Job {
        let now = Utc::now();
        Job::from_new(
            NewJob {
                id: JobId::new(),
                name: "demo::noop".to_string(),
                payload: JobPayload::default(),
                priority: 0,
                scheduled_at: now,
                max_attempts,
            },
            now,
        )
    }

    #[test]
    fn test_new_job_is_pending_and_claimable() {
        let job = job(5);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_empty());
        assert!(job.is_claimable(job.scheduled_at));
        assert!(!job.is_claimable(job.scheduled_at - Duration::seconds(1)));
    }

    #[test]
    fn test_failures_never_exceed_budget() {
        let mut job = job(2);
        let now = Utc::now();
        for _ in 0..4 {
            job.record_failure("boom", now);
        }
        assert_eq!(job.attempts, 2);
    }

    #[test]
    fn test_reschedule_keeps_last_claim() {
        let mut job = job(3);
        let now = Utc::now();
        job.mark_running("local-worker-1", now);
        assert_eq!(job.locked_by, "local-worker-1");

        job.record_failure("boom", now);
        job.reschedule(now + Duration::seconds(3), now);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.locked_at, Some(now));
        assert_eq!(job.locked_by, "local-worker-1");
        assert_eq!(job.scheduled_at, now + Duration::seconds(3));
    }

    #[test]
    fn test_reset_for_retry() {
        let mut job = job(1);
        let now = Utc::now();
        job.record_failure("boom", now);
        job.mark_failed(now);

        let later = now + Duration::minutes(5);
        job.reset_for_retry(later);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.last_error, "");
        assert_eq!(job.scheduled_at, later);
    }

    #[test]
    fn test_payload_shape() {
        let payload: JobPayload =
            serde_json::from_value(serde_json::json!({"args": [1, "x"]})).expect("payload");
        assert_eq!(payload.arg(1), Some(&serde_json::json!("x")));
        assert!(payload.kwargs.is_empty());

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value, serde_json::json!({"args": [1, "x"], "kwargs": {}}));
    }
}
