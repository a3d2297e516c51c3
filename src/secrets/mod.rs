//! Registry secret storage.
//!
//! A registry's sensitive fields travel as one opaque payload produced by
//! [`SecretCodec`] and stored under a [`ScopeKey`] by the configured
//! [`SecretBackend`]. Registries that select the dynamic platform CA get their
//! bundle from a [`CaBundleProvider`] at read time.

pub mod backends;
pub mod ca;
pub mod codec;
pub mod error;
pub mod scope;
pub mod types;

use std::sync::Arc;

use crate::config::SecretsConfig;

pub use backends::{
    provider_from_config, InlineBackendProvider, SecretBackend, SecretBackendProvider,
    SecretBackendType, VaultBackendProvider, VaultConfig, VaultSession,
};
pub use ca::{CaBundleProvider, FileCaBundleProvider, StaticCaBundleProvider};
pub use codec::SecretCodec;
pub use error::SecretsError;
pub use scope::ScopeKey;
pub use types::SecretString;

/// CA bundle source selected by configuration; without a path the bundle is unavailable.
pub fn ca_provider_from_config(config: &SecretsConfig) -> Arc<dyn CaBundleProvider> {
    match &config.ca_bundle_path {
        Some(path) => Arc::new(FileCaBundleProvider::new(path.clone())),
        None => Arc::new(StaticCaBundleProvider::unavailable()),
    }
}
