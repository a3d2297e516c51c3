//! # Error Handling
//!
//! Error types shared by every catalog component.

pub mod types;

pub use types::{CatalogError, ResourceRef, ResourceType, Result};
