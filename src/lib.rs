//! # Registry Catalog
//!
//! Multi-tenant catalog of artifact registries (Helm chart repositories and
//! container image registries). Each registry belongs to a project; its
//! credentials are stored through a pluggable secret backend and every committed
//! change fans out to watchers.
//!
//! ## Architecture
//!
//! ```text
//! RegistryService → RegistryRepository (sqlx / SQLite transaction)
//!        ↓                 ↓
//!   SecretBackend     EventBus → RegistryWatch (replay, then live)
//!  (inline | vault)
//! ```
//!
//! ## Core Components
//!
//! - **Secrets**: [`secrets::SecretCodec`] payload format, inline and Vault backends
//! - **Storage**: SQLx with SQLite, embedded migrations
//! - **Events**: bounded per-subscriber fan-out with snapshot replay
//! - **Services**: create / get / list / update / delete / watch of registries
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use registry_catalog::{auth::RequestContext, domain::*, storage::create_pool, CatalogConfig, RegistryService, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = CatalogConfig::from_env()?;
//!     let pool = create_pool(&config.database).await?;
//!     let service = RegistryService::from_config(pool, &config)?;
//!
//!     let ctx = RequestContext::new("tenant-1");
//!     let registry = Registry::new("charts", RegistryType::Helm, "https://charts.example.com");
//!     service.create_registry(&ctx, CreateRegistryRequest { registry }).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod observability;
pub mod secrets;
pub mod services;
pub mod storage;
pub mod validation;

// Re-export commonly used types and traits
pub use config::CatalogConfig;
pub use errors::{CatalogError, Result};
pub use events::{EventBus, RegistryEvent, RegistryEventKind, RegistryWatch};
pub use services::RegistryService;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
