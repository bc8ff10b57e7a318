//! In-process store.
//!
//! Implements all three store traits over maps guarded by a single
//! [`RwLock`]. `claim` runs its status check and update under one write
//! guard, which gives the same at-most-one-winner guarantee as the
//! PostgreSQL row lock. State is lost on restart.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use ironrelay_core::error::AppError;
use ironrelay_core::result::AppResult;
use ironrelay_core::types::{DeliveryId, IncomingWebhookId, JobId};
use ironrelay_entity::job::{Job, JobStatus, NewJob};
use ironrelay_entity::webhook::{
    DeliveryStatus, IncomingStatus, IncomingWebhook, NewIncomingWebhook, NewWebhookDelivery,
    WebhookDelivery,
};

use crate::store::{DeliveryStore, IncomingWebhookStore, JobStore};

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<JobId, Job>,
    deliveries: HashMap<DeliveryId, WebhookDelivery>,
    incoming: HashMap<IncomingWebhookId, IncomingWebhook>,
}

/// Shared in-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K, limit: i64) -> Vec<T> {
    items.sort_by_key(|item| Reverse(key(item)));
    items.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    items
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        let job = Job::from_new(job, now);
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn find_next_claimable(&self, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.is_claimable(now))
            .min_by_key(|job| (Reverse(job.priority), job.scheduled_at, job.created_at, job.id))
            .cloned())
    }

    async fn claim(&self, id: JobId, worker: &str, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        let mut state = self.state.write().await;
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.mark_running(worker, now);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        let mut state = self.state.write().await;
        match state.jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Job {} not found", job.id))),
        }
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64) -> AppResult<Vec<Job>> {
        let state = self.state.read().await;
        let jobs = state
            .jobs
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        Ok(newest_first(jobs, |job| (job.created_at, job.id), limit))
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        let state = self.state.read().await;
        Ok(state.jobs.values().filter(|job| job.status == status).count() as i64)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.state.read().await.jobs.len() as i64)
    }

    async fn reset_failed(&self, ids: Option<&[JobId]>, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut reset = 0;
        for job in state.jobs.values_mut() {
            let selected = ids.is_none_or(|ids| ids.contains(&job.id));
            if selected && job.status.can_retry() {
                job.reset_for_retry(now);
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn cancel(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.mark_cancelled(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn insert(
        &self,
        delivery: NewWebhookDelivery,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookDelivery> {
        let mut state = self.state.write().await;
        if state.deliveries.contains_key(&delivery.id) {
            return Err(AppError::conflict(format!(
                "Delivery {} already exists",
                delivery.id
            )));
        }
        let delivery = WebhookDelivery::from_new(delivery, now);
        state.deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn find_by_id(&self, id: DeliveryId) -> AppResult<Option<WebhookDelivery>> {
        Ok(self.state.read().await.deliveries.get(&id).cloned())
    }

    async fn save(&self, delivery: &WebhookDelivery) -> AppResult<()> {
        let mut state = self.state.write().await;
        match state.deliveries.get_mut(&delivery.id) {
            Some(stored) => {
                *stored = delivery.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Delivery {} not found",
                delivery.id
            ))),
        }
    }

    async fn list(&self, limit: i64) -> AppResult<Vec<WebhookDelivery>> {
        let state = self.state.read().await;
        let deliveries = state.deliveries.values().cloned().collect();
        Ok(newest_first(deliveries, |d| (d.created_at, d.id), limit))
    }

    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .values()
            .filter(|d| d.status == status)
            .count() as i64)
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.state.read().await.deliveries.len() as i64)
    }
}

#[async_trait]
impl IncomingWebhookStore for MemoryStore {
    async fn insert(
        &self,
        incoming: NewIncomingWebhook,
        now: DateTime<Utc>,
    ) -> AppResult<IncomingWebhook> {
        let record = IncomingWebhook::from_new(incoming, now);
        self.state
            .write()
            .await
            .incoming
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: IncomingWebhookId) -> AppResult<Option<IncomingWebhook>> {
        Ok(self.state.read().await.incoming.get(&id).cloned())
    }

    async fn set_handler_job(&self, id: IncomingWebhookId, job_id: JobId) -> AppResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .incoming
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Incoming webhook {id} not found")))?;
        record.handler_job_id = Some(job_id);
        Ok(())
    }

    async fn mark_status(&self, id: IncomingWebhookId, status: IncomingStatus) -> AppResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .incoming
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Incoming webhook {id} not found")))?;
        record.status = status;
        Ok(())
    }

    async fn list(&self, limit: i64) -> AppResult<Vec<IncomingWebhook>> {
        let state = self.state.read().await;
        let records = state.incoming.values().cloned().collect();
        Ok(newest_first(records, |r| (r.created_at, r.id), limit))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.state.read().await.incoming.len() as i64)
    }
}
