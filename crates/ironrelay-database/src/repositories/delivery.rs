//! Webhook delivery repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ironrelay_core::error::{AppError, ErrorKind};
use ironrelay_core::result::AppResult;
use ironrelay_core::types::DeliveryId;
use ironrelay_entity::webhook::{DeliveryStatus, NewWebhookDelivery, WebhookDelivery};

use crate::store::DeliveryStore;

/// Repository for the `iron_webhook_delivery` table.
#[derive(Debug, Clone)]
pub struct DeliveryRepository {
    pool: PgPool,
}

impl DeliveryRepository {
    /// Create a new delivery repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStore for DeliveryRepository {
    async fn insert(
        &self,
        delivery: NewWebhookDelivery,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookDelivery> {
        sqlx::query_as::<_, WebhookDelivery>(
            "INSERT INTO iron_webhook_delivery (id, event, target_url, payload, status, attempts, \
             max_attempts, last_response_code, last_response_body, last_error, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'pending', 0, $5, NULL, '', '', $6, $6) RETURNING *",
        )
        .bind(delivery.id)
        .bind(&delivery.event)
        .bind(&delivery.target_url)
        .bind(&delivery.payload)
        .bind(delivery.max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create delivery", e))
    }

    async fn find_by_id(&self, id: DeliveryId) -> AppResult<Option<WebhookDelivery>> {
        sqlx::query_as::<_, WebhookDelivery>("SELECT * FROM iron_webhook_delivery WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find delivery", e))
    }

    async fn save(&self, delivery: &WebhookDelivery) -> AppResult<()> {
        sqlx::query(
            "UPDATE iron_webhook_delivery SET status = $2, attempts = $3, last_response_code = $4, \
             last_response_body = $5, last_error = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(delivery.id)
        .bind(delivery.status)
        .bind(delivery.attempts)
        .bind(delivery.last_response_code)
        .bind(&delivery.last_response_body)
        .bind(&delivery.last_error)
        .bind(delivery.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save delivery", e))?;
        Ok(())
    }

    async fn list(&self, limit: i64) -> AppResult<Vec<WebhookDelivery>> {
        sqlx::query_as::<_, WebhookDelivery>(
            "SELECT * FROM iron_webhook_delivery ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list deliveries", e))
    }

    async fn count_by_status(&self, status: DeliveryStatus) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM iron_webhook_delivery WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count deliveries", e)
            })
    }

    async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM iron_webhook_delivery")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count deliveries", e)
            })
    }
}
