//! Manual migration runner
//!
//! Applies all pending catalog migrations to the configured SQLite database.
//! Usage: cargo run --bin run_migrations
//!
//! Set CATALOG_DATABASE_URL to choose the target database.

use registry_catalog::{
    config::CatalogConfig,
    observability::init_logging,
    storage::{create_pool, list_applied_migrations, run_migrations},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = CatalogConfig::from_env()?;
    init_logging(&config.observability)?;

    // Applied explicitly below so the outcome is reported.
    config.database.auto_migrate = false;

    info!(database_url = %config.database.url, "Running database migrations");
    let pool = create_pool(&config.database).await?;

    run_migrations(&pool).await?;

    for migration in list_applied_migrations(&pool).await? {
        info!(version = migration.version, description = %migration.description, "Applied migration");
    }
    info!("Migration completed successfully");

    Ok(())
}
