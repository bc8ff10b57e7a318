//! Database migration command.

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_database::connection::DatabasePool;
use ironrelay_database::migration::run_migrations;

use crate::output;

/// Apply all pending migrations to the configured database
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    if config.database.is_memory() {
        return Err(AppError::validation(
            "database.url is memory://; set a PostgreSQL url to run migrations",
        ));
    }

    let pool = DatabasePool::connect(&config.database).await?;
    println!("Running database migrations...");
    run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
