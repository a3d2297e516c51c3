//! Common test utilities for all integration tests.
//!
//! Provides the shared test database and a fully wired registry service.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

pub mod test_db;

use std::sync::Arc;

use registry_catalog::auth::{AllowAllAuthorizer, Authorizer, RequestContext};
use registry_catalog::domain::{CreateRegistryRequest, Registry, RegistryType};
use registry_catalog::events::EventBus;
use registry_catalog::secrets::{CaBundleProvider, InlineBackendProvider, SecretBackendProvider, StaticCaBundleProvider};
use registry_catalog::storage::{ApplicationRepository, NewApplication};
use registry_catalog::RegistryService;

pub use test_db::TestDatabase;

pub const PLATFORM_CA: &str = "-----BEGIN CERTIFICATE-----\nplatform\n-----END CERTIFICATE-----\n";

/// Registry service over a fresh database, inline secrets and a static platform CA
pub struct TestCatalog {
    pub db: TestDatabase,
    pub service: RegistryService,
}

impl TestCatalog {
    pub async fn new(prefix: &str) -> Self {
        Self::with_parts(prefix, Arc::new(InlineBackendProvider), Arc::new(AllowAllAuthorizer), 64).await
    }

    pub async fn with_parts(
        prefix: &str,
        backends: Arc<dyn SecretBackendProvider>,
        authorizer: Arc<dyn Authorizer>,
        event_buffer: usize,
    ) -> Self {
        let db = TestDatabase::new(prefix).await;
        let ca: Arc<dyn CaBundleProvider> = Arc::new(StaticCaBundleProvider::new(PLATFORM_CA));
        let service = RegistryService::new(db.pool.clone(), backends, ca, authorizer, EventBus::new(event_buffer));
        Self { db, service }
    }

    /// Record an application that pulls from the given registries
    pub async fn add_application(&self, project: &str, name: &str, helm: Option<&str>, image: Option<&str>) {
        let mut conn = self.db.pool.acquire().await.expect("acquire connection");
        ApplicationRepository
            .insert(
                &mut conn,
                project,
                &NewApplication {
                    name: name.to_string(),
                    version: "1.0.0".to_string(),
                    helm_registry: helm.map(str::to_string),
                    image_registry: image.map(str::to_string),
                },
            )
            .await
            .expect("insert application");
    }

    pub async fn remove_application(&self, project: &str, name: &str) {
        let mut conn = self.db.pool.acquire().await.expect("acquire connection");
        ApplicationRepository.delete(&mut conn, project, name, "1.0.0").await.expect("delete application");
    }

    pub async fn create(&self, project: &str, registry: Registry) -> Registry {
        self.service
            .create_registry(&ctx(project), CreateRegistryRequest { registry })
            .await
            .expect("create registry")
    }
}

pub fn ctx(project: &str) -> RequestContext {
    RequestContext::new(project).with_user("tester").with_client("127.0.0.1")
}

/// Registry with every sensitive field populated
pub fn registry(name: &str, registry_type: RegistryType) -> Registry {
    let mut registry = Registry::new(name, registry_type, format!("https://{}.example.com", name));
    registry.inventory_url = format!("https://{}.example.com/inventory", name);
    registry.username = "robot".to_string();
    registry.auth_token = format!("{}-token", name);
    registry.ca_certs = "-----BEGIN CERTIFICATE-----\nexplicit\n-----END CERTIFICATE-----\n".to_string();
    registry
}
