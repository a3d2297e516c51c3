//! # Observability
//!
//! Structured logging for the registry catalog.

pub mod logging;

pub use logging::{init_logging, log_activity, log_config_info};
