//! # Structured Logging
//!
//! Subscriber setup plus the activity record emitted by every successful
//! registry operation.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::auth::RequestContext;
use crate::config::{CatalogConfig, ObservabilityConfig};
use crate::errors::{CatalogError, Result};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Later calls return `Ok(())` without reinstalling.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| CatalogError::config(format!("Invalid log level '{}': {}", config.log_level, e)))?;

    if LOGGER_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let layer = if config.json_logging {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    if tracing_subscriber::registry().with(layer.with_filter(filter)).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
    let _ = LOGGER_INITIALIZED.set(());

    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &CatalogConfig) {
    tracing::info!(
        database_url = %config.database.url,
        secret_backend = %config.secrets.backend,
        vault_address = config.secrets.vault.as_ref().map(|v| v.address.as_str()),
        ca_bundle_configured = config.secrets.ca_bundle_path.is_some(),
        event_buffer = config.events.subscriber_buffer,
        authorization_enabled = config.auth.enabled,
        "Registry catalog configuration"
    );
}

/// Record a completed caller-visible action (`created`, `read`, `updated`, ...).
pub fn log_activity(ctx: &RequestContext, verb: &str, resource: &str, project_id: &str, name: &str) {
    tracing::info!(
        target: "activity",
        verb = verb,
        resource = resource,
        project_id = project_id,
        name = name,
        user = ctx.user.as_deref().unwrap_or("unknown"),
        client = ctx.client.as_deref().unwrap_or("unknown"),
        "activity"
    );
}
