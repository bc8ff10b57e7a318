//! Store traits the queue engine is written against.
//!
//! Every timestamp is passed in by the caller so that the engine's clock,
//! not the database's, decides eligibility and retry times.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ironrelay_core::result::AppResult;
use ironrelay_core::types::{DeliveryId, IncomingWebhookId, JobId};
use ironrelay_entity::job::{Job, JobStatus, NewJob};
use ironrelay_entity::webhook::{
    DeliveryStatus, IncomingStatus, IncomingWebhook, NewIncomingWebhook, NewWebhookDelivery,
    WebhookDelivery,
};

/// Durable job records with atomic claim support.
#[async_trait]
pub trait JobStore: Send + Sync + Debug {
    /// Persist a new `pending` job.
    async fn insert(&self, job: NewJob, now: DateTime<Utc>) -> AppResult<Job>;

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// The best pending candidate with `scheduled_at <= now`.
    ///
    /// Ordered by priority descending, then `scheduled_at`, `created_at`
    /// and `id` ascending.
    async fn find_next_claimable(&self, now: DateTime<Utc>) -> AppResult<Option<Job>>;

    /// Atomically move a `pending` job to `running` for `worker`.
    ///
    /// Returns `None` when the job is no longer pending, i.e. another worker
    /// won the race. This is not an error.
    async fn claim(&self, id: JobId, worker: &str, now: DateTime<Utc>) -> AppResult<Option<Job>>;

    /// Persist the mutable fields of a claimed job.
    async fn save(&self, job: &Job) -> AppResult<()>;

    /// Most recently created jobs first.
    async fn list(&self, status: Option<JobStatus>, limit: i64) -> AppResult<Vec<Job>>;

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64>;

    async fn count(&self) -> AppResult<i64>;

    /// Reset `failed` jobs (all of them, or only `ids`) to `pending` with a
    /// fresh attempt budget. Returns the number of jobs reset.
    async fn reset_failed(&self, ids: Option<&[JobId]>, now: DateTime<Utc>) -> AppResult<u64>;

    /// Cancel a `pending` job. Returns `false` if the job was not pending.
    async fn cancel(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool>;
}

/// Webhook delivery records.
#[async_trait]
pub trait DeliveryStore: Send + Sync + Debug {
    async fn insert(
        &self,
        delivery: NewWebhookDelivery,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookDelivery>;

    async fn find_by_id(&self, id: DeliveryId) -> AppResult<Option<WebhookDelivery>>;

    async fn save(&self, delivery: &WebhookDelivery) -> AppResult<()>;

    async fn list(&self, limit: i64) -> AppResult<Vec<WebhookDelivery>>;

    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<i64>;

    async fn count(&self) -> AppResult<i64>;
}

/// Inbound webhook log.
#[async_trait]
pub trait IncomingWebhookStore: Send + Sync + Debug {
    async fn insert(
        &self,
        incoming: NewIncomingWebhook,
        now: DateTime<Utc>,
    ) -> AppResult<IncomingWebhook>;

    async fn find_by_id(&self, id: IncomingWebhookId) -> AppResult<Option<IncomingWebhook>>;

    /// Link the record to the job that handles it.
    async fn set_handler_job(&self, id: IncomingWebhookId, job_id: JobId) -> AppResult<()>;

    async fn mark_status(&self, id: IncomingWebhookId, status: IncomingStatus) -> AppResult<()>;

    async fn list(&self, limit: i64) -> AppResult<Vec<IncomingWebhook>>;

    async fn count(&self) -> AppResult<i64>;
}
