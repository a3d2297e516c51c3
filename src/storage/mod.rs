//! # Storage and Persistence
//!
//! SQLite connectivity and the tenant-scoped tables of the registry catalog.

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub mod test_helpers;

pub use crate::config::DatabaseConfig;

pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations as run_db_migrations,
    validate_migrations, MigrationInfo,
};
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repositories::{
    next_update_time, ApplicationRepository, ApplicationRow, NewApplication, RegistryAttributes,
    RegistryRepository, RegistryRow,
};

use crate::errors::{CatalogError, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| CatalogError::database(e, "Database connectivity check failed"))?;

    Ok(())
}
