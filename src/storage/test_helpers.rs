//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` is a fresh file-backed SQLite database in a temporary
//! directory, in WAL mode with all migrations applied. The directory is removed
//! when the struct is dropped.

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, DbPool};

pub struct TestDatabase {
    pub pool: DbPool,
    _dir: tempfile::TempDir,
}

impl TestDatabase {
    pub async fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for test database");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join(format!("{}.db", name)).display()),
            max_connections: 4,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        };
        let pool = create_pool(&config).await.expect("create test database pool");
        Self { pool, _dir: dir }
    }
}
