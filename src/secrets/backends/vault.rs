//! Vault secret backend implementation
//!
//! Talks to HashiCorp Vault over its HTTP API: Kubernetes auth login, KV v2
//! read/write/delete under `secret/data/<scope key>`, and `revoke-self` on close.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use validator::Validate;

use super::backend::{SecretBackend, SecretBackendProvider, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::scope::ScopeKey;
use crate::secrets::types::SecretString;

/// Identity token mounted into every Kubernetes pod
pub const DEFAULT_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

const LOGIN_PATH: &str = "/v1/auth/kubernetes/login";
const SECRET_DATA_PATH: &str = "/v1/secret/data/";
const REVOKE_SELF_PATH: &str = "/v1/auth/token/revoke-self";
const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Configuration for the Vault backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Vault server address, e.g. `https://vault.example.com:8200`
    #[validate(url(message = "Vault address must be a valid URL"))]
    pub address: String,

    /// Kubernetes auth role to log in as
    #[validate(length(min = 1, message = "Vault role cannot be empty"))]
    pub role: String,

    /// File holding the service account JWT
    pub token_file: PathBuf,

    #[validate(range(min = 1, max = 300, message = "Vault timeout must be between 1 and 300 seconds"))]
    pub timeout_secs: u64,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: role.into(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            timeout_secs: 10,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    jwt: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: KvValue,
}

#[derive(Deserialize)]
struct KvValue {
    value: String,
}

/// One authenticated Vault session.
///
/// The session token is read under a shared lock for the whole duration of a
/// data call, and cleared under the exclusive lock by [`SecretBackend::close`],
/// so a revoke never races an in-flight request.
pub struct VaultSession {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl VaultSession {
    /// Exchange the mounted identity token for a Vault session token.
    pub async fn login(config: &VaultConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = config.address.trim_end_matches('/').to_string();
        let jwt = SecretString::new(tokio::fs::read_to_string(&config.token_file).await?.trim_end());

        debug!(address = %base_url, role = %config.role, "Logging in to Vault");

        let response = client
            .post(format!("{}{}", base_url, LOGIN_PATH))
            .json(&LoginRequest { jwt: jwt.expose_secret(), role: &config.role })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretsError::authentication_failed(format!(
                "Vault login rejected with status {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        let login: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| SecretsError::malformed("vault login", e.to_string()))?;
        if login.auth.client_token.is_empty() {
            return Err(SecretsError::authentication_failed("Vault returned an empty client token"));
        }

        info!(address = %base_url, role = %config.role, "Vault session established");

        Ok(Self { client, base_url, token: RwLock::new(Some(SecretString::new(login.auth.client_token))) })
    }

    fn secret_url(&self, key: &ScopeKey) -> String {
        format!("{}{}{}", self.base_url, SECRET_DATA_PATH, key)
    }

    fn session_closed() -> SecretsError {
        SecretsError::authentication_failed("Vault session is closed")
    }

    /// True until [`SecretBackend::close`] has run
    pub async fn is_open(&self) -> bool {
        self.token.read().await.is_some()
    }
}

#[async_trait]
impl SecretBackend for VaultSession {
    async fn write(&self, _conn: &mut SqliteConnection, key: &ScopeKey, payload: &str) -> Result<()> {
        let guard = self.token.read().await;
        let token = guard.as_ref().ok_or_else(Self::session_closed)?;

        let response = self
            .client
            .post(self.secret_url(key))
            .header(VAULT_TOKEN_HEADER, token.expose_secret())
            .json(&serde_json::json!({ "data": { "value": payload } }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretsError::unexpected_status("write secret", status.as_u16()));
        }

        debug!(scope_key = %key, "Stored secret in Vault");
        Ok(())
    }

    async fn read(&self, _conn: &mut SqliteConnection, key: &ScopeKey) -> Result<String> {
        let guard = self.token.read().await;
        let token = guard.as_ref().ok_or_else(Self::session_closed)?;

        let response = self
            .client
            .get(self.secret_url(key))
            .header(VAULT_TOKEN_HEADER, token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretsError::not_found(key.as_str()));
        }
        if !status.is_success() {
            return Err(SecretsError::unexpected_status("read secret", status.as_u16()));
        }

        let body = response.bytes().await?;
        let secret: KvReadResponse = serde_json::from_slice(&body)
            .map_err(|e| SecretsError::malformed("read secret", e.to_string()))?;
        Ok(secret.data.data.value)
    }

    async fn delete(&self, _conn: &mut SqliteConnection, key: &ScopeKey) -> Result<()> {
        let guard = self.token.read().await;
        let token = guard.as_ref().ok_or_else(Self::session_closed)?;

        let response = self
            .client
            .delete(self.secret_url(key))
            .header(VAULT_TOKEN_HEADER, token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretsError::unexpected_status("delete secret", status.as_u16()));
        }

        debug!(scope_key = %key, "Deleted secret from Vault");
        Ok(())
    }

    // The token is dropped even when revoke fails, so a closed session never issues another request.
    async fn close(&self) {
        let mut guard = self.token.write().await;
        let Some(token) = guard.take() else {
            return;
        };

        let result = self
            .client
            .post(format!("{}{}", self.base_url, REVOKE_SELF_PATH))
            .header(VAULT_TOKEN_HEADER, token.expose_secret())
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::NO_CONTENT => {
                debug!("Vault session token revoked");
            }
            Ok(response) => {
                warn!(status = response.status().as_u16(), "Vault token revoke returned unexpected status");
            }
            Err(e) => {
                warn!(error = %e, "Vault token revoke failed");
            }
        }
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Vault
    }
}

/// Opens a fresh [`VaultSession`] per operation, sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct VaultBackendProvider {
    config: VaultConfig,
    client: reqwest::Client,
}

impl VaultBackendProvider {
    pub fn new(config: VaultConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SecretBackendProvider for VaultBackendProvider {
    async fn open(&self) -> Result<Box<dyn SecretBackend>> {
        let session = VaultSession::login(&self.config, self.client.clone()).await?;
        Ok(Box::new(session))
    }

    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Vault
    }
}
