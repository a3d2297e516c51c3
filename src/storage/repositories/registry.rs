//! Registry repository
//!
//! Tenant + name keyed access to the `registries` table. Every method takes the
//! connection of the caller's transaction.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

use crate::domain::{Registry, RegistryType};
use crate::errors::{CatalogError, ResourceRef, Result};
use crate::validation::Page;

const REGISTRY_COLUMNS: &str = "id, project_uuid, name, display_name, description, registry_type, api_type, create_time, update_time";

/// Non-secret registry attributes as stored
#[derive(Debug, Clone, FromRow)]
pub struct RegistryRow {
    pub id: i64,
    pub project_uuid: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub registry_type: String,
    pub api_type: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl RegistryRow {
    pub fn registry_type(&self) -> Result<RegistryType> {
        self.registry_type.parse().map_err(|e: String| {
            CatalogError::internal(format!("registry {} has invalid stored type: {}", self.name, e))
        })
    }

    /// Public view without any secret fields
    pub fn to_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new(&self.name, self.registry_type()?, String::new());
        registry.display_name = self.display_name.clone();
        registry.description = self.description.clone();
        registry.api_type = self.api_type.clone();
        registry.create_time = Some(self.create_time);
        registry.update_time = Some(self.update_time);
        Ok(registry)
    }
}

/// Attributes written on create and update
#[derive(Debug, Clone)]
pub struct RegistryAttributes {
    pub display_name: String,
    pub description: String,
    pub registry_type: RegistryType,
    pub api_type: String,
}

/// Next `update_time` for a row: now, but strictly after the previous value
pub fn next_update_time(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryRepository;

impl RegistryRepository {
    #[instrument(skip(self, conn, attributes), fields(project_id = %project_id, registry = %name), name = "db_insert_registry")]
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        name: &str,
        attributes: &RegistryAttributes,
        now: DateTime<Utc>,
    ) -> Result<RegistryRow> {
        let sql = format!(
            "INSERT INTO registries (project_uuid, name, display_name, display_name_lc, description, registry_type, api_type, create_time, update_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING {}",
            REGISTRY_COLUMNS
        );

        sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(project_id)
            .bind(name)
            .bind(&attributes.display_name)
            .bind(attributes.display_name.to_lowercase())
            .bind(&attributes.description)
            .bind(attributes.registry_type.as_str())
            .bind(&attributes.api_type)
            .bind(now)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CatalogError::already_exists(ResourceRef::registry(name), format!("registry {} already exists", name))
                } else {
                    CatalogError::database(e, format!("Failed to insert registry '{}'", name))
                }
            })
    }

    #[instrument(skip(self, conn), fields(project_id = %project_id, registry = %name), name = "db_get_registry")]
    pub async fn fetch(&self, conn: &mut SqliteConnection, project_id: &str, name: &str) -> Result<Option<RegistryRow>> {
        let sql = format!("SELECT {} FROM registries WHERE project_uuid = $1 AND name = $2", REGISTRY_COLUMNS);
        sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(project_id)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, format!("Failed to get registry '{}'", name)))
    }

    /// One page of a project's registries, ordered by name
    #[instrument(skip(self, conn), fields(project_id = %project_id), name = "db_list_registries")]
    pub async fn list_page(&self, conn: &mut SqliteConnection, project_id: &str, page: Page) -> Result<Vec<RegistryRow>> {
        let sql = format!(
            "SELECT {} FROM registries WHERE project_uuid = $1 ORDER BY name LIMIT $2 OFFSET $3",
            REGISTRY_COLUMNS
        );
        sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(project_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, "Failed to list registries"))
    }

    /// Every registry of a project, ordered by name
    #[instrument(skip(self, conn), fields(project_id = %project_id), name = "db_list_all_registries")]
    pub async fn list_all(&self, conn: &mut SqliteConnection, project_id: &str) -> Result<Vec<RegistryRow>> {
        let sql = format!("SELECT {} FROM registries WHERE project_uuid = $1 ORDER BY name", REGISTRY_COLUMNS);
        sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, "Failed to list registries"))
    }

    pub async fn count(&self, conn: &mut SqliteConnection, project_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM registries WHERE project_uuid = $1")
            .bind(project_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, "Failed to count registries"))
    }

    /// Registries of the project, other than `exclude_name`, using the display name (case-insensitive)
    #[instrument(skip(self, conn), fields(project_id = %project_id), name = "db_count_display_name")]
    pub async fn count_display_name(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        display_name: &str,
        exclude_name: &str,
    ) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM registries WHERE project_uuid = $1 AND display_name_lc = $2 AND name != $3",
        )
        .bind(project_id)
        .bind(display_name.to_lowercase())
        .bind(exclude_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| CatalogError::database(e, "Failed to check display name uniqueness"))
    }

    /// Update the non-secret attributes; `None` when the row does not exist
    #[instrument(skip(self, conn, attributes), fields(project_id = %project_id, registry = %name), name = "db_update_registry")]
    pub async fn update(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        name: &str,
        attributes: &RegistryAttributes,
        update_time: DateTime<Utc>,
    ) -> Result<Option<RegistryRow>> {
        let sql = format!(
            "UPDATE registries SET display_name = $1, display_name_lc = $2, description = $3, registry_type = $4, api_type = $5, update_time = $6 \
             WHERE project_uuid = $7 AND name = $8 RETURNING {}",
            REGISTRY_COLUMNS
        );

        sqlx::query_as::<_, RegistryRow>(&sql)
            .bind(&attributes.display_name)
            .bind(attributes.display_name.to_lowercase())
            .bind(&attributes.description)
            .bind(attributes.registry_type.as_str())
            .bind(&attributes.api_type)
            .bind(update_time)
            .bind(project_id)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, format!("Failed to update registry '{}'", name)))
    }

    /// Delete a registry row, returning the number of rows removed
    #[instrument(skip(self, conn), fields(project_id = %project_id, registry = %name), name = "db_delete_registry")]
    pub async fn delete(&self, conn: &mut SqliteConnection, project_id: &str, name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM registries WHERE project_uuid = $1 AND name = $2")
            .bind(project_id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| CatalogError::database(e, format!("Failed to delete registry '{}'", name)))?;
        Ok(result.rows_affected())
    }
}
