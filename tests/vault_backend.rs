//! Registry operations with secrets kept in a (mocked) Vault server.

mod common;

use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ctx, registry, TestCatalog};
use registry_catalog::auth::AllowAllAuthorizer;
use registry_catalog::domain::{
    CreateRegistryRequest, DeleteRegistryRequest, GetRegistryRequest, RegistrySecret, RegistryType,
};
use registry_catalog::errors::CatalogError;
use registry_catalog::secrets::{ScopeKey, SecretCodec, VaultBackendProvider, VaultConfig};
use registry_catalog::storage::RegistryRepository;

const SESSION_TOKEN: &str = "hvs.catalog-session";

struct VaultFixture {
    server: MockServer,
    catalog: TestCatalog,
    _token_file: tempfile::NamedTempFile,
}

async fn vault_fixture(prefix: &str) -> VaultFixture {
    let server = MockServer::start().await;
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(token_file, "service-account-jwt").unwrap();

    let mut config = VaultConfig::new(server.uri(), "app-orch-catalog");
    config.token_file = token_file.path().to_path_buf();
    config.timeout_secs = 5;

    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .and(body_json(json!({ "jwt": "service-account-jwt", "role": "app-orch-catalog" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth": { "client_token": SESSION_TOKEN } })))
        .mount(&server)
        .await;

    let provider = VaultBackendProvider::new(config).unwrap();
    let catalog = TestCatalog::with_parts(prefix, Arc::new(provider), Arc::new(AllowAllAuthorizer), 16).await;

    VaultFixture { server, catalog, _token_file: token_file }
}

fn secret_path(project: &str, name: &str) -> String {
    format!("/v1/secret/data/{}", ScopeKey::new(project, name).unwrap())
}

#[tokio::test]
async fn test_create_get_delete_through_vault() {
    let fixture = vault_fixture("vault_lifecycle").await;
    let charts = registry("charts", RegistryType::Helm);
    let payload = SecretCodec.encode(&RegistrySecret::from_registry(&charts));
    let secret_path = secret_path("p1", "charts");

    Mock::given(method("POST"))
        .and(path(secret_path.as_str()))
        .and(header("X-Vault-Token", SESSION_TOKEN))
        .and(body_json(json!({ "data": { "value": payload } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "version": 1 } })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    Mock::given(method("GET"))
        .and(path(secret_path.as_str()))
        .and(header("X-Vault-Token", SESSION_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "data": { "value": payload } } })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(secret_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&fixture.server)
        .await;
    // One session per operation, each revoked when the operation ends.
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .and(header("X-Vault-Token", SESSION_TOKEN))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&fixture.server)
        .await;

    let service = &fixture.catalog.service;
    service.create_registry(&ctx("p1"), CreateRegistryRequest { registry: charts }).await.unwrap();

    let full = service
        .get_registry(&ctx("p1"), GetRegistryRequest { registry_name: "charts".to_string(), show_sensitive_info: true })
        .await
        .unwrap();
    assert_eq!(full.auth_token, "charts-token");
    assert_eq!(full.username, "robot");

    service.delete_registry(&ctx("p1"), DeleteRegistryRequest { registry_name: "charts".to_string() }).await.unwrap();

    let mut conn = fixture.catalog.db.pool.acquire().await.unwrap();
    assert_eq!(RegistryRepository.count(&mut conn, "p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_vault_write_failure_rolls_back_create() {
    let fixture = vault_fixture("vault_write_fail").await;
    Mock::given(method("POST"))
        .and(path(secret_path("p1", "charts").as_str()))
        .respond_with(ResponseTemplate::new(503))
        .mount(&fixture.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let err = fixture
        .catalog
        .service
        .create_registry(&ctx("p1"), CreateRegistryRequest { registry: registry("charts", RegistryType::Helm) })
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::SecretBackend { .. }));

    let mut conn = fixture.catalog.db.pool.acquire().await.unwrap();
    assert_eq!(RegistryRepository.count(&mut conn, "p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_vault_login_failure_aborts_before_any_write() {
    let server = MockServer::start().await;
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(token_file, "service-account-jwt").unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut config = VaultConfig::new(server.uri(), "app-orch-catalog");
    config.token_file = token_file.path().to_path_buf();
    let catalog = TestCatalog::with_parts(
        "vault_login_fail",
        Arc::new(VaultBackendProvider::new(config).unwrap()),
        Arc::new(AllowAllAuthorizer),
        16,
    )
    .await;

    let err = catalog
        .service
        .create_registry(&ctx("p1"), CreateRegistryRequest { registry: registry("charts", RegistryType::Helm) })
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::SecretBackend { .. }));
    assert!(err.is_retryable());

    let mut conn = catalog.db.pool.acquire().await.unwrap();
    assert_eq!(RegistryRepository.count(&mut conn, "p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_vault_secret_delete_failure_is_not_fatal() {
    let fixture = vault_fixture("vault_delete_fail").await;
    Mock::given(method("POST"))
        .and(path(secret_path("p1", "charts").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "version": 1 } })))
        .mount(&fixture.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(secret_path("p1", "charts").as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&fixture.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fixture.server)
        .await;

    let service = &fixture.catalog.service;
    service
        .create_registry(&ctx("p1"), CreateRegistryRequest { registry: registry("charts", RegistryType::Helm) })
        .await
        .unwrap();
    service.delete_registry(&ctx("p1"), DeleteRegistryRequest { registry_name: "charts".to_string() }).await.unwrap();

    let mut conn = fixture.catalog.db.pool.acquire().await.unwrap();
    assert_eq!(RegistryRepository.count(&mut conn, "p1").await.unwrap(), 0);
}
