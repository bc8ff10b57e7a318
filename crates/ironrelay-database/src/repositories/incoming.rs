//! Inbound webhook repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ironrelay_core::error::{AppError, ErrorKind};
use ironrelay_core::result::AppResult;
use ironrelay_core::types::{IncomingWebhookId, JobId};
use ironrelay_entity::webhook::{IncomingStatus, IncomingWebhook, NewIncomingWebhook};

use crate::store::IncomingWebhookStore;

/// Repository for the `iron_incoming_webhook` table.
#[derive(Debug, Clone)]
pub struct IncomingWebhookRepository {
    pool: PgPool,
}

impl IncomingWebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncomingWebhookStore for IncomingWebhookRepository {
    async fn insert(
        &self,
        incoming: NewIncomingWebhook,
        now: DateTime<Utc>,
    ) -> AppResult<IncomingWebhook> {
        sqlx::query_as::<_, IncomingWebhook>(
            "INSERT INTO iron_incoming_webhook (id, source, event, payload, status, handler_job_id, created_at) \
             VALUES ($1, $2, $3, $4, 'received', NULL, $5) RETURNING *",
        )
        .bind(incoming.id)
        .bind(&incoming.source)
        .bind(&incoming.event)
        .bind(&incoming.payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to store incoming webhook", e)
        })
    }

    async fn find_by_id(&self, id: IncomingWebhookId) -> AppResult<Option<IncomingWebhook>> {
        sqlx::query_as::<_, IncomingWebhook>("SELECT * FROM iron_incoming_webhook WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find incoming webhook", e)
            })
    }

    async fn set_handler_job(&self, id: IncomingWebhookId, job_id: JobId) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE iron_incoming_webhook SET handler_job_id = $2 WHERE id = $1")
                .bind(id)
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to link handler job", e)
                })?;
        ensure_found(result.rows_affected(), id)
    }

    async fn mark_status(&self, id: IncomingWebhookId, status: IncomingStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE iron_incoming_webhook SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update incoming webhook", e)
            })?;
        ensure_found(result.rows_affected(), id)
    }

    async fn list(&self, limit: i64) -> AppResult<Vec<IncomingWebhook>> {
        sqlx::query_as::<_, IncomingWebhook>(
            "SELECT * FROM iron_incoming_webhook ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list incoming webhooks", e)
        })
    }

    async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM iron_incoming_webhook")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count incoming webhooks", e)
            })
    }
}

fn ensure_found(rows_affected: u64, id: IncomingWebhookId) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::not_found(format!("Incoming webhook {id} not found")));
    }
    Ok(())
}
