//! Platform CA bundle sources.
//!
//! Consulted only for registries whose CA field selects the dynamic platform CA.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::{Result, SecretsError};

/// Source of the platform's current CA bundle (PEM text).
#[async_trait]
pub trait CaBundleProvider: Send + Sync + std::fmt::Debug {
    async fn ca_bundle(&self) -> Result<String>;
}

/// Reads the bundle from a mounted PEM file on every call.
#[derive(Debug, Clone)]
pub struct FileCaBundleProvider {
    path: PathBuf,
}

impl FileCaBundleProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CaBundleProvider for FileCaBundleProvider {
    async fn ca_bundle(&self) -> Result<String> {
        let pem = tokio::fs::read_to_string(&self.path).await?;
        if pem.trim().is_empty() {
            return Err(SecretsError::decode(format!(
                "CA bundle at {} is empty",
                self.path.display()
            )));
        }
        Ok(pem)
    }
}

/// Fixed bundle, for embedding and tests. `None` behaves like a missing bundle.
#[derive(Debug, Clone, Default)]
pub struct StaticCaBundleProvider {
    bundle: Option<String>,
}

impl StaticCaBundleProvider {
    pub fn new(bundle: impl Into<String>) -> Self {
        Self { bundle: Some(bundle.into()) }
    }

    pub fn unavailable() -> Self {
        Self { bundle: None }
    }
}

#[async_trait]
impl CaBundleProvider for StaticCaBundleProvider {
    async fn ca_bundle(&self) -> Result<String> {
        self.bundle.clone().ok_or_else(|| {
            SecretsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "platform CA bundle is not configured",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_provider_reads_bundle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n").unwrap();

        let provider = FileCaBundleProvider::new(file.path());
        let pem = provider.ca_bundle().await.unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let provider = FileCaBundleProvider::new("/nonexistent/ca.crt");
        assert!(matches!(provider.ca_bundle().await, Err(SecretsError::Io(_))));
    }

    #[tokio::test]
    async fn test_file_provider_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let provider = FileCaBundleProvider::new(file.path());
        assert!(provider.ca_bundle().await.is_err());
    }

    #[tokio::test]
    async fn test_static_provider() {
        assert_eq!(StaticCaBundleProvider::new("pem").ca_bundle().await.unwrap(), "pem");
        assert!(StaticCaBundleProvider::unavailable().ca_bundle().await.is_err());
    }
}
