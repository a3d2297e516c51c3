//! Inline secret backend
//!
//! Keeps the encoded payload in the `secret_blob` column of the owning registry
//! row, so secret writes commit or roll back with the registry itself.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;

use super::backend::{SecretBackend, SecretBackendProvider, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::scope::ScopeKey;

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSecretBackend;

#[async_trait]
impl SecretBackend for InlineSecretBackend {
    async fn write(&self, conn: &mut SqliteConnection, key: &ScopeKey, payload: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE registries SET secret_blob = $1 WHERE project_uuid = $2 AND name = $3",
        )
        .bind(payload)
        .bind(key.tenant())
        .bind(key.name())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SecretsError::not_found(key.as_str()));
        }

        debug!(scope_key = %key, "Stored inline secret");
        Ok(())
    }

    async fn read(&self, conn: &mut SqliteConnection, key: &ScopeKey) -> Result<String> {
        let blob: Option<Option<String>> = sqlx::query_scalar(
            "SELECT secret_blob FROM registries WHERE project_uuid = $1 AND name = $2",
        )
        .bind(key.tenant())
        .bind(key.name())
        .fetch_optional(&mut *conn)
        .await?;

        blob.flatten().ok_or_else(|| SecretsError::not_found(key.as_str()))
    }

    async fn delete(&self, conn: &mut SqliteConnection, key: &ScopeKey) -> Result<()> {
        // The row may already be gone; clearing nothing is not an error.
        sqlx::query("UPDATE registries SET secret_blob = NULL WHERE project_uuid = $1 AND name = $2")
            .bind(key.tenant())
            .bind(key.name())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn close(&self) {}

    fn is_transactional(&self) -> bool {
        true
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Inline
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InlineBackendProvider;

#[async_trait]
impl SecretBackendProvider for InlineBackendProvider {
    async fn open(&self) -> Result<Box<dyn SecretBackend>> {
        Ok(Box::new(InlineSecretBackend))
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Inline
    }
}
