//! Test database utilities for integration tests.
//!
//! Each database is a file-backed SQLite database (WAL mode, migrations
//! applied) inside its own temporary directory, removed on drop.

#![allow(clippy::duplicate_mod)]

use registry_catalog::config::DatabaseConfig;
use registry_catalog::storage::{create_pool, DbPool};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique database names within a test run
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A test database that is deleted together with its directory on drop.
pub struct TestDatabase {
    pub pool: DbPool,
    pub path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestDatabase {
    pub async fn new(prefix: &str) -> Self {
        let dir = tempfile::tempdir().expect("create test database directory");
        let counter = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = dir.path().join(format!("{}_{}_{}.db", prefix, std::process::id(), counter));

        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        };
        let pool = create_pool(&config).await.expect("create test database pool");

        Self { pool, path, _dir: dir }
    }
}
