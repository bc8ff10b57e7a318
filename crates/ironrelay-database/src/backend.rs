//! Store selection.

use std::sync::Arc;

use tracing::info;

use ironrelay_core::config::DatabaseConfig;
use ironrelay_core::result::AppResult;
use ironrelay_entity::job::JobStatus;
use ironrelay_entity::stats::QueueStats;
use ironrelay_entity::webhook::DeliveryStatus;

use crate::connection::DatabasePool;
use crate::memory::MemoryStore;
use crate::migration::run_migrations;
use crate::repositories::{DeliveryRepository, IncomingWebhookRepository, JobRepository};
use crate::store::{DeliveryStore, IncomingWebhookStore, JobStore};

/// The three stores the application works with, behind trait objects.
#[derive(Debug, Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub deliveries: Arc<dyn DeliveryStore>,
    pub incoming: Arc<dyn IncomingWebhookStore>,
    pool: Option<DatabasePool>,
}

impl Stores {
    /// Open the backend selected by `config.url`.
    ///
    /// `memory://` gives a fresh in-process store; anything else is treated
    /// as a PostgreSQL URL and migrated when `run_migrations` is set.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        if config.is_memory() {
            info!("Using in-memory job store; state is lost on restart");
            return Ok(Self::memory(MemoryStore::new()));
        }

        let pool = DatabasePool::connect(config).await?;
        if config.run_migrations {
            run_migrations(pool.pool()).await?;
        }
        Ok(Self::postgres(pool))
    }

    pub fn memory(store: MemoryStore) -> Self {
        Self {
            jobs: Arc::new(store.clone()),
            deliveries: Arc::new(store.clone()),
            incoming: Arc::new(store),
            pool: None,
        }
    }

    pub fn postgres(pool: DatabasePool) -> Self {
        Self {
            jobs: Arc::new(JobRepository::new(pool.pool().clone())),
            deliveries: Arc::new(DeliveryRepository::new(pool.pool().clone())),
            incoming: Arc::new(IncomingWebhookRepository::new(pool.pool().clone())),
            pool: Some(pool),
        }
    }

    /// The PostgreSQL pool, if this is a durable backend.
    pub fn pool(&self) -> Option<&DatabasePool> {
        self.pool.as_ref()
    }

    /// Aggregate counts across all three stores.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            pending_jobs: self.jobs.count_by_status(JobStatus::Pending).await?,
            running_jobs: self.jobs.count_by_status(JobStatus::Running).await?,
            success_jobs: self.jobs.count_by_status(JobStatus::Success).await?,
            failed_jobs: self.jobs.count_by_status(JobStatus::Failed).await?,
            cancelled_jobs: self.jobs.count_by_status(JobStatus::Cancelled).await?,
            total_jobs: self.jobs.count().await?,
            pending_deliveries: self
                .deliveries
                .count_by_status(DeliveryStatus::Pending)
                .await?,
            sending_deliveries: self
                .deliveries
                .count_by_status(DeliveryStatus::Sending)
                .await?,
            success_deliveries: self
                .deliveries
                .count_by_status(DeliveryStatus::Success)
                .await?,
            failed_deliveries: self
                .deliveries
                .count_by_status(DeliveryStatus::Failed)
                .await?,
            total_deliveries: self.deliveries.count().await?,
            total_incoming: self.incoming.count().await?,
        })
    }

    /// Close the connection pool, if any.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ironrelay_core::types::{DeliveryId, JobId};
    use ironrelay_entity::job::{JobPayload, NewJob};
    use ironrelay_entity::webhook::{NewIncomingWebhook, NewWebhookDelivery};

    #[tokio::test]
    async fn test_memory_url_selects_memory_store() {
        let stores = Stores::connect(&DatabaseConfig::default()).await.unwrap();
        assert!(stores.pool().is_none());
        assert_eq!(stores.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_stats_counts_every_store() {
        let stores = Stores::memory(MemoryStore::new());
        let now = Utc::now();

        stores
            .jobs
            .insert(
                NewJob {
                    id: JobId::new(),
                    name: "tests::noop".to_string(),
                    payload: JobPayload::default(),
                    priority: 0,
                    scheduled_at: now,
                    max_attempts: 5,
                },
                now,
            )
            .await
            .unwrap();
        stores
            .deliveries
            .insert(
                NewWebhookDelivery {
                    id: DeliveryId::new(),
                    event: "ping".to_string(),
                    target_url: "http://localhost/hook".to_string(),
                    payload: serde_json::json!({}),
                    max_attempts: 5,
                },
                now,
            )
            .await
            .unwrap();
        stores
            .incoming
            .insert(
                NewIncomingWebhook::from_body("stripe", serde_json::json!({})),
                now,
            )
            .await
            .unwrap();

        let stats = stores.stats().await.unwrap();
        assert_eq!(stats.pending_jobs, 1);
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.pending_deliveries, 1);
        assert_eq!(stats.total_deliveries, 1);
        assert_eq!(stats.total_incoming, 1);
    }
}
