//! Secret backend traits and types
//!
//! A [`SecretBackendProvider`] is configured once per process. Each logical
//! registry operation opens its own [`SecretBackend`] session, uses it inside the
//! operation's transaction and closes it before returning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use std::str::FromStr;

use crate::secrets::error::Result;
use crate::secrets::scope::ScopeKey;

/// Type of secret backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackendType {
    /// Column on the registry row, inside the caller's transaction
    #[default]
    Inline,
    /// HashiCorp Vault KV v2 behind Kubernetes auth
    Vault,
}

impl SecretBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Vault => "vault",
        }
    }
}

impl FromStr for SecretBackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "vault" => Ok(Self::Vault),
            _ => Err(format!("Unknown secret backend type: {}", s)),
        }
    }
}

impl fmt::Display for SecretBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One session against a secret store.
///
/// Every data call receives the operation's connection, normally inside its
/// transaction. The inline backend writes through it; remote backends ignore it.
/// Deletes from a non-transactional backend run only after the row deletion
/// has committed.
#[async_trait]
pub trait SecretBackend: Send + Sync + fmt::Debug {
    /// Store (or replace) the opaque payload under `key`
    async fn write(&self, conn: &mut SqliteConnection, key: &ScopeKey, payload: &str) -> Result<()>;

    /// Load the payload stored under `key`; `SecretsError::NotFound` when absent
    async fn read(&self, conn: &mut SqliteConnection, key: &ScopeKey) -> Result<String>;

    /// Remove the payload stored under `key`
    async fn delete(&self, conn: &mut SqliteConnection, key: &ScopeKey) -> Result<()>;

    /// Release session resources. Idempotent; failures are only logged.
    async fn close(&self);

    /// True when the payload lives on the registry row and shares its transaction
    fn is_transactional(&self) -> bool {
        false
    }

    fn backend_type(&self) -> SecretBackendType;
}

/// Factory for per-operation backend sessions
#[async_trait]
pub trait SecretBackendProvider: Send + Sync + fmt::Debug {
    /// Open a session, performing any login the backend needs
    async fn open(&self) -> Result<Box<dyn SecretBackend>>;

    fn backend_type(&self) -> SecretBackendType;
}
