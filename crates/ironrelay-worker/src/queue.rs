//! Job queue: enqueueing and administrative actions.

use std::sync::Arc;

use chrono::Duration;
use futures::FutureExt;
use serde_json::{Map, Value};

use ironrelay_core::error::AppError;
use ironrelay_core::traits::Clock;
use ironrelay_core::types::JobId;
use ironrelay_database::{Stores, UnitOfWork};
use ironrelay_entity::job::{Job, JobPayload, JobStatus, NewJob};
use ironrelay_entity::stats::QueueStats;

/// Parameters for creating a new job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    name: String,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    delay: Option<Duration>,
    priority: i32,
    max_attempts: Option<i32>,
}

impl JobRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            delay: None,
            priority: 0,
            max_attempts: None,
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set a named argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Do not run before `delay` has passed.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Job queue for enqueuing work and operator actions on existing jobs.
#[derive(Debug, Clone)]
pub struct JobQueue {
    stores: Stores,
    clock: Arc<dyn Clock>,
    default_max_attempts: i32,
}

impl JobQueue {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>, default_max_attempts: i32) -> Self {
        Self {
            stores,
            clock,
            default_max_attempts,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate `request` and turn it into a job record, without writing.
    pub(crate) fn build(&self, request: JobRequest) -> Result<NewJob, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Job name must not be empty"));
        }
        let max_attempts = request.max_attempts.unwrap_or(self.default_max_attempts);
        if max_attempts < 1 {
            return Err(AppError::validation(format!(
                "max_attempts must be at least 1, got {max_attempts}"
            )));
        }
        let now = self.clock.now();
        let scheduled_at = match request.delay {
            None => now,
            Some(delay) => now
                .checked_add_signed(delay)
                .ok_or_else(|| AppError::validation(format!("Job delay {delay} is out of range")))?,
        };
        Ok(NewJob {
            id: JobId::new(),
            name: name.to_string(),
            payload: JobPayload::new(request.args, request.kwargs),
            priority: request.priority,
            scheduled_at,
            max_attempts,
        })
    }

    /// Schedule the job's creation for when `uow` commits.
    ///
    /// The id is returned immediately. If the unit of work is rolled back or
    /// dropped, no job with that id will ever exist.
    pub fn defer(&self, uow: &mut UnitOfWork, request: JobRequest) -> Result<JobId, AppError> {
        let job = self.build(request)?;
        Ok(self.defer_built(uow, job))
    }

    /// Register the insert of an already validated job on `uow`.
    pub(crate) fn defer_built(&self, uow: &mut UnitOfWork, job: NewJob) -> JobId {
        let id = job.id;
        let jobs = Arc::clone(&self.stores.jobs);
        let clock = Arc::clone(&self.clock);
        uow.on_commit(move || {
            async move {
                let job = jobs.insert(job, clock.now()).await?;
                tracing::debug!(job.id = %job.id, job.name = %job.name, "Enqueued job after commit");
                Ok(())
            }
            .boxed()
        });
        id
    }

    /// Insert the job right away.
    pub async fn enqueue(&self, request: JobRequest) -> Result<Job, AppError> {
        let job = self.build(request)?;
        self.enqueue_built(job).await
    }

    pub(crate) async fn enqueue_built(&self, job: NewJob) -> Result<Job, AppError> {
        let job = self.stores.jobs.insert(job, self.clock.now()).await?;
        tracing::debug!(
            job.id = %job.id,
            job.name = %job.name,
            priority = job.priority,
            "Enqueued job"
        );
        Ok(job)
    }

    pub async fn find(&self, id: JobId) -> Result<Option<Job>, AppError> {
        self.stores.jobs.find_by_id(id).await
    }

    pub async fn list(&self, status: Option<JobStatus>, limit: i64) -> Result<Vec<Job>, AppError> {
        self.stores.jobs.list(status, limit.clamp(1, 1000)).await
    }

    /// Reset failed jobs to pending with a fresh attempt budget.
    ///
    /// `None` resets every failed job.
    pub async fn retry_failed(&self, ids: Option<&[JobId]>) -> Result<u64, AppError> {
        let count = self.stores.jobs.reset_failed(ids, self.clock.now()).await?;
        tracing::info!(count, "Reset failed jobs to pending");
        Ok(count)
    }

    /// Cancel a pending job.
    pub async fn cancel(&self, id: JobId) -> Result<(), AppError> {
        if self.stores.jobs.cancel(id, self.clock.now()).await? {
            tracing::info!(job.id = %id, "Job cancelled");
            return Ok(());
        }
        match self.stores.jobs.find_by_id(id).await? {
            None => Err(AppError::not_found(format!("Job {id} not found"))),
            Some(job) => Err(AppError::conflict(format!(
                "Job {id} is {} and cannot be cancelled",
                job.status
            ))),
        }
    }

    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        self.stores.stats().await
    }
}
