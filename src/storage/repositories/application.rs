//! Application repository
//!
//! Applications reference registries by name; the catalog only needs to
//! record them and count references so in-use registries cannot be deleted.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

use crate::errors::{CatalogError, ResourceRef, ResourceType, Result};

#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub project_uuid: String,
    pub name: String,
    pub version: String,
    pub helm_registry: Option<String>,
    pub image_registry: Option<String>,
    pub create_time: DateTime<Utc>,
}

/// Application to record, with the registries it pulls from
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub name: String,
    pub version: String,
    pub helm_registry: Option<String>,
    pub image_registry: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationRepository;

impl ApplicationRepository {
    #[instrument(skip(self, conn, application), fields(project_id = %project_id, application = %application.name), name = "db_insert_application")]
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        application: &NewApplication,
    ) -> Result<ApplicationRow> {
        sqlx::query_as::<_, ApplicationRow>(
            "INSERT INTO applications (project_uuid, name, version, helm_registry, image_registry, create_time) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, project_uuid, name, version, helm_registry, image_registry, create_time",
        )
        .bind(project_id)
        .bind(&application.name)
        .bind(&application.version)
        .bind(&application.helm_registry)
        .bind(&application.image_registry)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => CatalogError::already_exists(
                ResourceRef { resource_type: Some(ResourceType::Application), name: Some(application.name.clone()) },
                format!("application {} version {} already exists", application.name, application.version),
            ),
            _ => CatalogError::database(e, format!("Failed to insert application '{}'", application.name)),
        })
    }

    #[instrument(skip(self, conn), fields(project_id = %project_id, application = %name), name = "db_delete_application")]
    pub async fn delete(&self, conn: &mut SqliteConnection, project_id: &str, name: &str, version: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM applications WHERE project_uuid = $1 AND name = $2 AND version = $3")
            .bind(project_id)
            .bind(name)
            .bind(version)
            .execute(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, format!("Failed to delete application '{}'", name)))?;
        Ok(result.rows_affected())
    }

    /// Applications of the project that use `registry_name` as Helm or image registry
    #[instrument(skip(self, conn), fields(project_id = %project_id, registry = %registry_name), name = "db_count_registry_references")]
    pub async fn count_registry_references(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        registry_name: &str,
    ) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE project_uuid = $1 AND (helm_registry = $2 OR image_registry = $2)",
        )
        .bind(project_id)
        .bind(registry_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| CatalogError::database(e, "Failed to count registry references"))
    }
}
