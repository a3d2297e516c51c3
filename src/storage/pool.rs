//! # Database Connection Pool Management
//!
//! Provides database connection pool creation and management utilities.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{str::FromStr, time::Duration};

use crate::config::DatabaseConfig;
use crate::errors::{CatalogError, Result};

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a database connection pool with the specified configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| CatalogError::database(e, format!("Invalid SQLite connection string: {}", config.url)))?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
        .map_err(|e| CatalogError::database(e, format!("Failed to connect to database: {}", config.url)))?;

    tracing::info!(
        database_type = "sqlite",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        busy_timeout_ms = SQLITE_BUSY_TIMEOUT.as_millis(),
        "Database connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running database migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(CatalogError::config("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(CatalogError::config("min_connections cannot be greater than max_connections"));
    }

    if !config.url.starts_with("sqlite:") {
        return Err(CatalogError::config("database URL must start with 'sqlite:'"));
    }

    Ok(())
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

pub fn get_pool_stats(pool: &DbPool) -> PoolStats {
    PoolStats { size: pool.size(), idle: pool.num_idle() }
}
