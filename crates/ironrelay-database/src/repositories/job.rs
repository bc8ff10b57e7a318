//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use ironrelay_core::error::{AppError, ErrorKind};
use ironrelay_core::result::AppResult;
use ironrelay_core::types::JobId;
use ironrelay_entity::job::{Job, JobStatus, NewJob};

use crate::store::JobStore;

/// Repository for the `iron_task` table.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert(&self, job: NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO iron_task (id, name, payload, status, priority, scheduled_at, attempts, \
             max_attempts, last_error, locked_at, locked_by, created_at, updated_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, 0, $6, '', NULL, '', $7, $7) RETURNING *",
        )
        .bind(job.id)
        .bind(&job.name)
        .bind(Json(&job.payload))
        .bind(job.priority)
        .bind(job.scheduled_at)
        .bind(job.max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM iron_task WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn find_next_claimable(&self, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM iron_task WHERE status = 'pending' AND scheduled_at <= $1 \
             ORDER BY priority DESC, scheduled_at ASC, created_at ASC, id ASC LIMIT 1",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to poll for jobs", e))
    }

    async fn claim(&self, id: JobId, worker: &str, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin claim transaction", e)
        })?;

        let current = sqlx::query_as::<_, Job>("SELECT * FROM iron_task WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock job", e))?;

        // Dropping the transaction releases the row lock.
        let Some(mut job) = current.filter(|job| job.status == JobStatus::Pending) else {
            return Ok(None);
        };

        job.mark_running(worker, now);

        sqlx::query(
            "UPDATE iron_task SET status = $2, locked_at = $3, locked_by = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.locked_at)
        .bind(&job.locked_by)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim job", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit job claim", e)
        })?;

        Ok(Some(job))
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        sqlx::query(
            "UPDATE iron_task SET status = $2, scheduled_at = $3, attempts = $4, \
             max_attempts = $5, last_error = $6, locked_at = $7, locked_by = $8, updated_at = $9 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.scheduled_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(&job.last_error)
        .bind(job.locked_at)
        .bind(&job.locked_by)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save job", e))?;
        Ok(())
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM iron_task WHERE ($1::job_status IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM iron_task WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }

    async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM iron_task")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }

    async fn reset_failed(&self, ids: Option<&[JobId]>, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE iron_task SET status = 'pending', attempts = 0, last_error = '', \
             scheduled_at = $1, locked_at = NULL, locked_by = '', updated_at = $1 \
             WHERE status = 'failed' AND ($2::uuid[] IS NULL OR id = ANY($2))",
        )
        .bind(now)
        .bind(ids.map(<[JobId]>::to_vec))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reset failed jobs", e))?;
        Ok(result.rows_affected())
    }

    async fn cancel(&self, id: JobId, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE iron_task SET status = 'cancelled', updated_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cancel job", e))?;
        Ok(result.rows_affected() > 0)
    }
}
