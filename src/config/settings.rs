//! # Configuration Settings
//!
//! Defines the configuration structure for the registry catalog.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::errors::{CatalogError, Result};
use crate::secrets::backends::{SecretBackendType, VaultConfig, DEFAULT_TOKEN_FILE};

/// Main catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct CatalogConfig {
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub secrets: SecretsConfig,

    #[validate(nested)]
    pub events: EventsConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,

    pub auth: AuthConfig,
}

impl CatalogConfig {
    /// Load configuration from the process environment (and `.env`, when present)
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database: DatabaseConfig::from_lookup(&lookup),
            secrets: SecretsConfig::from_lookup(&lookup)?,
            events: EventsConfig::from_lookup(&lookup),
            observability: ObservabilityConfig::from_lookup(&lookup),
            auth: AuthConfig::from_lookup(&lookup),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| CatalogError::config(e.to_string()))?;

        if !self.database.url.starts_with("sqlite:") {
            return Err(CatalogError::config("Database URL must start with 'sqlite:'"));
        }

        if self.secrets.backend == SecretBackendType::Vault && self.secrets.vault.is_none() {
            return Err(CatalogError::config(
                "CATALOG_SECRET_BACKEND=vault requires CATALOG_VAULT_ADDR (or VAULT_SERVER_ADDRESS)",
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|s| s.trim().parse::<T>().ok()).unwrap_or(default)
}

fn flag_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|s| s.eq_ignore_ascii_case("true") || s == "1").unwrap_or(default)
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Apply pending migrations when the pool is created
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/catalog.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            url: lookup("CATALOG_DATABASE_URL").unwrap_or(defaults.url),
            max_connections: parse_or(lookup, "CATALOG_DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_or(lookup, "CATALOG_DATABASE_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout_seconds: parse_or(
                lookup,
                "CATALOG_DATABASE_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            ),
            auto_migrate: flag_or(lookup, "CATALOG_DATABASE_AUTO_MIGRATE", defaults.auto_migrate),
        }
    }
}

/// Where registry secrets are kept
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct SecretsConfig {
    pub backend: SecretBackendType,

    /// Present whenever a Vault address is configured
    #[validate(nested)]
    pub vault: Option<VaultConfig>,

    /// PEM file with the platform CA, used by registries selecting the dynamic CA
    pub ca_bundle_path: Option<PathBuf>,
}

impl SecretsConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CATALOG_SECRET_BACKEND") {
            Some(value) => value.parse::<SecretBackendType>().map_err(CatalogError::config)?,
            None => SecretBackendType::default(),
        };

        let address = lookup("CATALOG_VAULT_ADDR")
            .or_else(|| lookup("VAULT_SERVER_ADDRESS"))
            .filter(|s| !s.trim().is_empty());
        let vault = address.map(|address| VaultConfig {
            address,
            role: lookup("CATALOG_VAULT_ROLE").or_else(|| lookup("SERVICE_ACCOUNT")).unwrap_or_default(),
            token_file: lookup("CATALOG_VAULT_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            timeout_secs: parse_or(lookup, "CATALOG_VAULT_TIMEOUT_SECS", 10),
        });

        Ok(Self { backend, vault, ca_bundle_path: lookup("CATALOG_CA_BUNDLE_PATH").map(PathBuf::from) })
    }
}

/// Event fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventsConfig {
    /// Events buffered per watcher before it is disconnected
    #[validate(range(min = 1, max = 65536, message = "Event buffer must be between 1 and 65536"))]
    pub subscriber_buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { subscriber_buffer: 64 }
    }
}

impl EventsConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self { subscriber_buffer: parse_or(lookup, "CATALOG_EVENT_BUFFER", Self::default().subscriber_buffer) }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            log_level: lookup("CATALOG_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json_logging: lookup("CATALOG_LOG_FORMAT").map(|f| f.eq_ignore_ascii_case("json")).unwrap_or(false),
        }
    }
}

/// Authorization configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// When false every request is allowed
    pub enabled: bool,
}

impl AuthConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self { enabled: flag_or(lookup, "CATALOG_AUTHZ_ENABLED", false) }
    }
}
