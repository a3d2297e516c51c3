//! # Configuration Management
//!
//! Catalog configuration is read once from the environment and then passed
//! explicitly into the components that need it.

pub mod settings;

pub use settings::{
    AuthConfig, CatalogConfig, DatabaseConfig, EventsConfig, ObservabilityConfig, SecretsConfig,
};
