//! Pluggable secret backend architecture
//!
//! ## Supported Backends
//!
//! - **Inline**: payload stored on the registry row, same transaction
//! - **Vault**: HashiCorp Vault KV v2 behind Kubernetes auth, one session per operation

pub mod backend;
pub mod inline;
pub mod vault;

use std::sync::Arc;

use crate::config::SecretsConfig;
use crate::errors::{CatalogError, Result};

pub use backend::{SecretBackend, SecretBackendProvider, SecretBackendType};
pub use inline::{InlineBackendProvider, InlineSecretBackend};
pub use vault::{VaultBackendProvider, VaultConfig, VaultSession, DEFAULT_TOKEN_FILE};

/// Build the session provider selected by configuration.
pub fn provider_from_config(config: &SecretsConfig) -> Result<Arc<dyn SecretBackendProvider>> {
    match config.backend {
        SecretBackendType::Inline => {
            tracing::info!(backend = "inline", "Registry secrets stored inline");
            Ok(Arc::new(InlineBackendProvider))
        }
        SecretBackendType::Vault => {
            let vault = config.vault.clone().ok_or_else(|| {
                CatalogError::config("secret backend 'vault' selected but no Vault address configured")
            })?;
            tracing::info!(backend = "vault", address = %vault.address, role = %vault.role, "Registry secrets stored in Vault");
            let provider = VaultBackendProvider::new(vault)
                .map_err(|e| CatalogError::config(format!("failed to build Vault client: {}", e)))?;
            Ok(Arc::new(provider))
        }
    }
}
