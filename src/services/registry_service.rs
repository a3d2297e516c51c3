//! Registry business logic service
//!
//! Every operation follows the same sequence: resolve the caller's project,
//! validate the request, authorize it, open a secret backend session, run the
//! work inside one database transaction, then commit and publish the resulting
//! events under the bus sequencing lock. The backend session is closed on every
//! path once the transaction is finished.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::auth::{AllowAllAuthorizer, Authorizer, RequestContext, ScopeAuthorizer};
use crate::config::CatalogConfig;
use crate::domain::{
    CaCertificates, CreateRegistryRequest, DeleteRegistryRequest, GetRegistryRequest, ListRegistriesRequest,
    ListRegistriesResponse, Registry, RegistrySecret, UpdateRegistryRequest, WatchRegistriesRequest,
};
use crate::errors::{CatalogError, ResourceRef, ResourceType, Result};
use crate::events::{EventBus, RegistryEvent, RegistryWatch, SubscriptionFilter};
use crate::observability::log_activity;
use crate::secrets::{
    ca_provider_from_config, provider_from_config, CaBundleProvider, ScopeKey, SecretBackend, SecretBackendProvider,
    SecretCodec,
};
use crate::storage::{next_update_time, ApplicationRepository, DbPool, RegistryAttributes, RegistryRepository, RegistryRow};
use crate::validation::{effective_display_name, validate_pagination, validate_registry, Page};

const RESOURCE: &str = "registry";

/// Authorization names of the registry requests
pub mod request_names {
    pub const CREATE: &str = "CreateRegistryRequest";
    pub const GET: &str = "GetRegistryRequest";
    pub const GET_SENSITIVE: &str = "GetRegistryWithSensitiveInfoRequest";
    pub const LIST: &str = "ListRegistriesRequest";
    pub const LIST_SENSITIVE: &str = "ListRegistriesWithSensitiveInfoRequest";
    pub const UPDATE: &str = "UpdateRegistryRequest";
    pub const DELETE: &str = "DeleteRegistryRequest";
    pub const WATCH: &str = "WatchRegistriesRequest";
    pub const WATCH_SENSITIVE: &str = "WatchRegistriesWithSensitiveInfoRequest";
}

/// Platform CA bundle, loaded at most once per operation
struct PlatformCa<'a> {
    provider: &'a dyn CaBundleProvider,
    bundle: Option<String>,
}

impl<'a> PlatformCa<'a> {
    fn new(provider: &'a dyn CaBundleProvider) -> Self {
        Self { provider, bundle: None }
    }

    async fn bundle(&mut self) -> Result<String> {
        if let Some(bundle) = &self.bundle {
            return Ok(bundle.clone());
        }
        let bundle = self
            .provider
            .ca_bundle()
            .await
            .map_err(|e| CatalogError::secret_backend(e, "Failed to load platform CA bundle"))?;
        self.bundle = Some(bundle.clone());
        Ok(bundle)
    }
}

/// Service for managing registries of every project
pub struct RegistryService {
    pool: DbPool,
    secret_backends: Arc<dyn SecretBackendProvider>,
    ca_bundle: Arc<dyn CaBundleProvider>,
    authorizer: Arc<dyn Authorizer>,
    events: Arc<EventBus>,
    registries: RegistryRepository,
    applications: ApplicationRepository,
    codec: SecretCodec,
}

impl RegistryService {
    pub fn new(
        pool: DbPool,
        secret_backends: Arc<dyn SecretBackendProvider>,
        ca_bundle: Arc<dyn CaBundleProvider>,
        authorizer: Arc<dyn Authorizer>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            secret_backends,
            ca_bundle,
            authorizer,
            events,
            registries: RegistryRepository,
            applications: ApplicationRepository,
            codec: SecretCodec,
        }
    }

    /// Wire the service from configuration
    pub fn from_config(pool: DbPool, config: &CatalogConfig) -> Result<Self> {
        let authorizer: Arc<dyn Authorizer> =
            if config.auth.enabled { Arc::new(ScopeAuthorizer) } else { Arc::new(AllowAllAuthorizer) };

        Ok(Self::new(
            pool,
            provider_from_config(&config.secrets)?,
            ca_provider_from_config(&config.secrets),
            authorizer,
            EventBus::new(config.events.subscriber_buffer),
        ))
    }

    /// Event bus the service publishes to
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create a registry together with its secret
    #[instrument(skip(self, ctx, request), fields(registry = %request.registry.name), name = "create_registry")]
    pub async fn create_registry(&self, ctx: &RequestContext, request: CreateRegistryRequest) -> Result<Registry> {
        let project_id = ctx.resolve_project()?;
        let registry = request.registry;
        validate_registry(&registry)?;
        let display_name = effective_display_name(&registry.name, &registry.display_name)?;
        self.authorizer.check(ctx, &project_id, request_names::CREATE).await?;

        let backend = self.open_backend().await?;
        let result = self.create_in_tx(backend.as_ref(), &project_id, registry, display_name).await;
        backend.close().await;
        let created = result?;

        info!(project_id = %project_id, registry = %created.name, "Registry created");
        log_activity(ctx, "created", RESOURCE, &project_id, &created.name);
        Ok(created)
    }

    async fn create_in_tx(
        &self,
        backend: &dyn SecretBackend,
        project_id: &str,
        registry: Registry,
        display_name: String,
    ) -> Result<Registry> {
        let mut tx = self.begin_write().await?;

        self.ensure_display_name_unique(&mut tx, project_id, &registry.name, &display_name).await?;

        let attributes = attributes_of(&registry, display_name);
        let row = self.registries.insert(&mut tx, project_id, &registry.name, &attributes, Utc::now()).await?;

        let secret = RegistrySecret::from_registry(&registry);
        self.write_secret(backend, &mut tx, project_id, &registry.name, &secret).await?;

        let mut created = row.to_registry()?;
        apply_secret(&mut created, &secret);

        self.commit_and_publish(tx, vec![RegistryEvent::created(project_id, created.clone())]).await?;
        Ok(created)
    }

    /// Get one registry; sensitive fields are blanked unless requested
    #[instrument(skip(self, ctx, request), fields(registry = %request.registry_name), name = "get_registry")]
    pub async fn get_registry(&self, ctx: &RequestContext, request: GetRegistryRequest) -> Result<Registry> {
        let project_id = ctx.resolve_project()?;
        if request.registry_name.is_empty() {
            return Err(CatalogError::incomplete_request(ResourceType::Registry));
        }
        let request_name = if request.show_sensitive_info { request_names::GET_SENSITIVE } else { request_names::GET };
        self.authorizer.check(ctx, &project_id, request_name).await?;

        let backend = self.open_backend().await?;
        let result = self
            .get_in_tx(backend.as_ref(), &project_id, &request.registry_name, request.show_sensitive_info)
            .await;
        backend.close().await;
        let registry = result?;

        log_activity(ctx, "read", RESOURCE, &project_id, &registry.name);
        Ok(registry)
    }

    async fn get_in_tx(
        &self,
        backend: &dyn SecretBackend,
        project_id: &str,
        name: &str,
        show_sensitive_info: bool,
    ) -> Result<Registry> {
        let mut tx = self.begin().await?;
        let row = self
            .registries
            .fetch(&mut tx, project_id, name)
            .await?
            .ok_or_else(|| CatalogError::not_found(ResourceRef::registry(name)))?;

        let mut platform_ca = PlatformCa::new(self.ca_bundle.as_ref());
        let registry = self.load_view(backend, &mut tx, project_id, &row, show_sensitive_info, &mut platform_ca).await?;
        self.finish_read(tx).await?;
        Ok(registry)
    }

    /// One page of the project's registries, ordered by name
    #[instrument(skip(self, ctx, request), fields(page_size = request.page_size, offset = request.offset), name = "list_registries")]
    pub async fn list_registries(
        &self,
        ctx: &RequestContext,
        request: ListRegistriesRequest,
    ) -> Result<ListRegistriesResponse> {
        let project_id = ctx.resolve_project()?;
        let page = validate_pagination(request.page_size, request.offset)?;
        let request_name =
            if request.show_sensitive_info { request_names::LIST_SENSITIVE } else { request_names::LIST };
        self.authorizer.check(ctx, &project_id, request_name).await?;

        let backend = self.open_backend().await?;
        let result = self.list_in_tx(backend.as_ref(), &project_id, page, request.show_sensitive_info).await;
        backend.close().await;
        let response = result?;

        log_activity(ctx, "listed", RESOURCE, &project_id, "");
        Ok(response)
    }

    async fn list_in_tx(
        &self,
        backend: &dyn SecretBackend,
        project_id: &str,
        page: Page,
        show_sensitive_info: bool,
    ) -> Result<ListRegistriesResponse> {
        let mut tx = self.begin().await?;
        let total = self.registries.count(&mut tx, project_id).await?;
        let rows = self.registries.list_page(&mut tx, project_id, page).await?;

        let mut platform_ca = PlatformCa::new(self.ca_bundle.as_ref());
        let mut registries = Vec::with_capacity(rows.len());
        for row in &rows {
            registries
                .push(self.load_view(backend, &mut tx, project_id, row, show_sensitive_info, &mut platform_ca).await?);
        }
        self.finish_read(tx).await?;

        Ok(ListRegistriesResponse { registries, total_elements: i32::try_from(total).unwrap_or(i32::MAX) })
    }

    /// Replace a registry's attributes and secret. The name is immutable.
    #[instrument(skip(self, ctx, request), fields(registry = %request.registry_name), name = "update_registry")]
    pub async fn update_registry(&self, ctx: &RequestContext, request: UpdateRegistryRequest) -> Result<Registry> {
        let project_id = ctx.resolve_project()?;
        if request.registry_name.is_empty() {
            return Err(CatalogError::incomplete_request(ResourceType::Registry));
        }
        let registry = request.registry;
        if registry.name != request.registry_name {
            return Err(CatalogError::invalid_argument(
                ResourceRef::kind(ResourceType::Registry),
                format!("name cannot be changed {} != {}", request.registry_name, registry.name),
            ));
        }
        validate_registry(&registry)?;
        let display_name = effective_display_name(&registry.name, &registry.display_name)?;
        self.authorizer.check(ctx, &project_id, request_names::UPDATE).await?;

        let backend = self.open_backend().await?;
        let result = self.update_in_tx(backend.as_ref(), &project_id, registry, display_name).await;
        backend.close().await;
        let updated = result?;

        info!(project_id = %project_id, registry = %updated.name, "Registry updated");
        log_activity(ctx, "updated", RESOURCE, &project_id, &updated.name);
        Ok(updated)
    }

    async fn update_in_tx(
        &self,
        backend: &dyn SecretBackend,
        project_id: &str,
        registry: Registry,
        display_name: String,
    ) -> Result<Registry> {
        let mut tx = self.begin_write().await?;
        let name = registry.name.as_str();

        let existing = self
            .registries
            .fetch(&mut tx, project_id, name)
            .await?
            .ok_or_else(|| CatalogError::not_found(ResourceRef::registry(name)))?;

        self.ensure_display_name_unique(&mut tx, project_id, name, &display_name).await?;

        if existing.registry_type()? != registry.registry_type {
            let references = self.applications.count_registry_references(&mut tx, project_id, name).await?;
            if references > 0 {
                return Err(CatalogError::failed_precondition(
                    ResourceRef::registry(name),
                    format!("cannot change registry type to {}", registry.registry_type),
                ));
            }
        }

        let attributes = attributes_of(&registry, display_name);
        let update_time = next_update_time(existing.update_time, Utc::now());
        let row = self
            .registries
            .update(&mut tx, project_id, name, &attributes, update_time)
            .await?
            .ok_or_else(|| CatalogError::not_found(ResourceRef::registry(name)))?;

        let secret = RegistrySecret::from_registry(&registry);
        self.write_secret(backend, &mut tx, project_id, name, &secret).await?;

        let mut updated = row.to_registry()?;
        apply_secret(&mut updated, &secret);

        self.commit_and_publish(tx, vec![RegistryEvent::updated(project_id, updated.clone())]).await?;
        Ok(updated)
    }

    /// Delete an unused registry and its secret
    #[instrument(skip(self, ctx, request), fields(registry = %request.registry_name), name = "delete_registry")]
    pub async fn delete_registry(&self, ctx: &RequestContext, request: DeleteRegistryRequest) -> Result<()> {
        let project_id = ctx.resolve_project()?;
        if request.registry_name.is_empty() {
            return Err(CatalogError::incomplete_request(ResourceType::Registry));
        }
        let key = scope_key(&project_id, &request.registry_name)?;
        self.authorizer.check(ctx, &project_id, request_names::DELETE).await?;

        let backend = self.open_backend().await?;
        let result = self.delete_in_tx(&project_id, &request.registry_name).await;
        if result.is_ok() && !backend.is_transactional() {
            self.delete_detached_secret(backend.as_ref(), &key).await;
        }
        backend.close().await;
        result?;

        info!(project_id = %project_id, registry = %request.registry_name, "Registry deleted");
        log_activity(ctx, "deleted", RESOURCE, &project_id, &request.registry_name);
        Ok(())
    }

    /// Delete the row; a transactional backend's secret goes with it.
    async fn delete_in_tx(&self, project_id: &str, name: &str) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let uses = self.applications.count_registry_references(&mut tx, project_id, name).await?;
        if uses > 0 {
            return Err(CatalogError::failed_precondition(
                ResourceRef::registry(name),
                "cannot delete registry while in use",
            ));
        }

        let existing = self
            .registries
            .fetch(&mut tx, project_id, name)
            .await?
            .ok_or_else(|| CatalogError::not_found(ResourceRef::registry(name)))?;
        if self.registries.delete(&mut tx, project_id, name).await? == 0 {
            return Err(CatalogError::not_found(ResourceRef::registry(name)));
        }

        let deleted = existing.to_registry()?;
        self.commit_and_publish(tx, vec![RegistryEvent::deleted(project_id, deleted)]).await
    }

    /// Start watching the project's registries.
    ///
    /// Unless `no_replay` is set, the watch first yields one `Replayed` event per
    /// registry, read from a snapshot that no concurrent commit can interleave with.
    #[instrument(skip(self, ctx, request), fields(no_replay = request.no_replay), name = "watch_registries")]
    pub async fn watch_registries(&self, ctx: &RequestContext, request: WatchRegistriesRequest) -> Result<RegistryWatch> {
        let project_id = ctx.resolve_project_allow_admin(&request.project_id)?;
        let request_name =
            if request.show_sensitive_info { request_names::WATCH_SENSITIVE } else { request_names::WATCH };
        self.authorizer.check(ctx, &project_id, request_name).await?;

        let filter = SubscriptionFilter::new(&project_id, request.show_sensitive_info);

        let watch = if request.no_replay {
            RegistryWatch::new(Vec::new(), self.events.subscribe(filter))
        } else {
            let backend = self.open_backend().await?;
            let result = self.snapshot_and_subscribe(backend.as_ref(), &project_id, filter).await;
            backend.close().await;
            result?
        };

        info!(
            project_id = %project_id,
            replayed = watch.pending_replay(),
            show_sensitive_info = request.show_sensitive_info,
            "Registry watch started"
        );
        log_activity(ctx, "watched", RESOURCE, &project_id, "");
        Ok(watch)
    }

    async fn snapshot_and_subscribe(
        &self,
        backend: &dyn SecretBackend,
        project_id: &str,
        filter: SubscriptionFilter,
    ) -> Result<RegistryWatch> {
        // Connection first: mutations waiting on the sequencer already hold theirs.
        let mut tx = self.begin().await?;
        let _sequence = self.events.sequence().await;

        let rows = self.registries.list_all(&mut tx, project_id).await?;
        let mut platform_ca = PlatformCa::new(self.ca_bundle.as_ref());
        let mut replay = Vec::with_capacity(rows.len());
        for row in &rows {
            let registry = self
                .load_view(backend, &mut tx, project_id, row, filter.show_sensitive_info, &mut platform_ca)
                .await?;
            replay.push(RegistryEvent::replayed(project_id, registry));
        }

        let subscription = self.events.subscribe(filter);
        self.finish_read(tx).await?;
        Ok(RegistryWatch::new(replay, subscription))
    }

    async fn open_backend(&self) -> Result<Box<dyn SecretBackend>> {
        self.secret_backends.open().await.map_err(|e| {
            CatalogError::secret_backend(
                e,
                format!("Failed to open {} secret backend", self.secret_backends.backend_type()),
            )
        })
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(|e| CatalogError::database(e, "Failed to begin transaction"))
    }

    /// Transaction that takes the SQLite write lock up front, so concurrent
    /// writers queue on the busy timeout instead of failing on a stale snapshot.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| CatalogError::database(e, "Failed to begin write transaction"))
    }

    /// Remove an external secret once its row deletion has committed.
    /// The row is authoritative; a secret left behind is only logged.
    async fn delete_detached_secret(&self, backend: &dyn SecretBackend, key: &ScopeKey) {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(scope_key = %key, error = %e, "No connection for registry secret delete, leaving it behind");
                return;
            }
        };
        if let Err(e) = backend.delete(&mut conn, key).await {
            warn!(scope_key = %key, error = %e, "Failed to delete registry secret, leaving it behind");
        }
    }

    /// Commit, then publish while still holding the sequencing lock
    async fn commit_and_publish(&self, tx: Transaction<'static, Sqlite>, events: Vec<RegistryEvent>) -> Result<()> {
        let _sequence = self.events.sequence().await;
        tx.commit().await.map_err(|e| CatalogError::database(e, "Failed to commit transaction"))?;
        self.events.publish(&events);
        Ok(())
    }

    async fn finish_read(&self, tx: Transaction<'static, Sqlite>) -> Result<()> {
        tx.commit().await.map_err(|e| CatalogError::database(e, "Failed to finish read transaction"))
    }

    async fn ensure_display_name_unique(
        &self,
        conn: &mut SqliteConnection,
        project_id: &str,
        name: &str,
        display_name: &str,
    ) -> Result<()> {
        if self.registries.count_display_name(conn, project_id, display_name, name).await? > 0 {
            return Err(CatalogError::already_exists(
                ResourceRef::registry(name),
                format!("{} {} display name {} is not unique", RESOURCE, name, display_name),
            ));
        }
        Ok(())
    }

    async fn write_secret(
        &self,
        backend: &dyn SecretBackend,
        conn: &mut SqliteConnection,
        project_id: &str,
        name: &str,
        secret: &RegistrySecret,
    ) -> Result<()> {
        let key = scope_key(project_id, name)?;
        backend
            .write(conn, &key, &self.codec.encode(secret))
            .await
            .map_err(|e| CatalogError::secret_backend(e, format!("Failed to write secret of registry '{}'", name)))
    }

    /// Public view of a stored row: reads and decodes its secret, then blanks
    /// the sensitive fields unless they were requested.
    async fn load_view(
        &self,
        backend: &dyn SecretBackend,
        conn: &mut SqliteConnection,
        project_id: &str,
        row: &RegistryRow,
        show_sensitive_info: bool,
        platform_ca: &mut PlatformCa<'_>,
    ) -> Result<Registry> {
        let key = scope_key(project_id, &row.name)?;
        let blob = backend
            .read(conn, &key)
            .await
            .map_err(|e| CatalogError::secret_backend(e, format!("Failed to read secret of registry '{}'", row.name)))?;
        let secret = self
            .codec
            .decode(&blob)
            .map_err(|e| CatalogError::secret_backend(e, format!("Failed to decode secret of registry '{}'", row.name)))?;

        let mut registry = row.to_registry()?;
        registry.root_url = secret.root_url;
        registry.inventory_url = secret.inventory_url;
        if show_sensitive_info {
            registry.username = secret.username;
            registry.auth_token = secret.auth_token;
            registry.ca_certs = match secret.ca_certs {
                CaCertificates::Explicit(pem) => pem.into_string(),
                CaCertificates::UseDynamicPlatformCa => platform_ca.bundle().await?,
            };
        }
        Ok(registry)
    }
}

impl std::fmt::Debug for RegistryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryService")
            .field("secret_backend", &self.secret_backends.backend_type())
            .field("events", &self.events)
            .finish()
    }
}

fn scope_key(project_id: &str, name: &str) -> Result<ScopeKey> {
    ScopeKey::new(project_id, name)
        .map_err(|e| CatalogError::invalid_argument(ResourceRef::registry(name), e.to_string()))
}

fn attributes_of(registry: &Registry, display_name: String) -> RegistryAttributes {
    RegistryAttributes {
        display_name,
        description: registry.description.clone(),
        registry_type: registry.registry_type,
        api_type: registry.api_type.clone(),
    }
}

fn apply_secret(registry: &mut Registry, secret: &RegistrySecret) {
    registry.root_url = secret.root_url.clone();
    registry.inventory_url = secret.inventory_url.clone();
    registry.username = secret.username.clone();
    registry.auth_token = secret.auth_token.clone();
    registry.ca_certs = secret.ca_certs.to_api();
}
