//! Commit-hook queue for deferring writes until a transaction commits.
//!
//! A [`UnitOfWork`] collects hooks. They run, in registration order, only
//! when [`UnitOfWork::commit`] is called. Rolling back or dropping the unit
//! of work discards them, so a job deferred inside a failed transaction
//! never exists.

use futures::future::BoxFuture;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;

use ironrelay_core::error::{AppError, ErrorKind};
use ironrelay_core::result::AppResult;

use crate::connection::DatabasePool;

type CommitHook = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<()>> + Send>;

/// An ordered queue of after-commit actions.
#[derive(Default)]
pub struct UnitOfWork {
    hooks: Vec<CommitHook>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run after a successful commit.
    pub fn on_commit<F>(&mut self, hook: F)
    where
        F: FnOnce() -> BoxFuture<'static, AppResult<()>> + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Run every hook in order. Stops at the first failing hook.
    pub async fn commit(mut self) -> AppResult<()> {
        let hooks = std::mem::take(&mut self.hooks);
        for hook in hooks {
            hook().await?;
        }
        Ok(())
    }

    /// Discard every hook.
    pub fn rollback(mut self) {
        let discarded = std::mem::take(&mut self.hooks).len();
        if discarded > 0 {
            debug!(discarded, "Unit of work rolled back");
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.hooks.is_empty() {
            debug!(
                discarded = self.hooks.len(),
                "Unit of work dropped without commit"
            );
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// A PostgreSQL transaction with an attached commit-hook queue.
///
/// Application writes go through [`PgUnitOfWork::conn`]; deferred jobs are
/// registered on [`PgUnitOfWork::work`]. Hooks run after the transaction
/// commits.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    work: UnitOfWork,
}

impl PgUnitOfWork {
    /// Begin a new transaction.
    pub async fn begin(pool: &DatabasePool) -> AppResult<Self> {
        let tx = pool.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;
        Ok(Self {
            tx,
            work: UnitOfWork::new(),
        })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub fn work(&mut self) -> &mut UnitOfWork {
        &mut self.work
    }

    /// Commit the transaction, then run the hooks.
    pub async fn commit(self) -> AppResult<()> {
        self.tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        self.work.commit().await
    }

    /// Roll back the transaction and discard the hooks.
    pub async fn rollback(self) -> AppResult<()> {
        self.work.rollback();
        self.tx.rollback().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to roll back transaction", e)
        })
    }
}
