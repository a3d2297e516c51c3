//! # Validation Module
//!
//! Input checks applied before any registry operation touches storage:
//! derive-based field rules on [`Registry`], display-name shape and
//! pagination bounds.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::Validate;

use crate::domain::Registry;
use crate::errors::{CatalogError, ResourceRef, ResourceType, Result};

/// Largest page a list request may ask for
pub const MAX_PAGE_SIZE: i32 = 500;
/// Page size used when a list request leaves it at zero
pub const DEFAULT_PAGE_SIZE: i32 = 20;

/// Registry names: lowercase alphanumerics and hyphens, at most 40 characters
pub static REGISTRY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{0,38}[a-z0-9]{0,1}$").expect("Registry name regex is valid at compile time")
});

/// Field-level validation of a registry payload
pub fn validate_registry(registry: &Registry) -> Result<()> {
    registry.validate().map_err(|errors| match CatalogError::from(errors) {
        CatalogError::InvalidArgument { message, .. } => {
            CatalogError::invalid_argument(ResourceRef::registry(&registry.name), message)
        }
        other => other,
    })
}

/// Effective display name: the name itself when none is given.
///
/// A supplied display name must not carry leading or trailing whitespace.
pub fn effective_display_name(name: &str, display_name: &str) -> Result<String> {
    if display_name.is_empty() {
        return Ok(name.to_string());
    }
    if display_name != display_name.trim() {
        return Err(CatalogError::invalid_argument(
            ResourceRef::registry(name),
            format!("display name '{}' must not have leading or trailing whitespace", display_name),
        ));
    }
    Ok(display_name.to_string())
}

/// Validated `LIMIT`/`OFFSET` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Check list pagination; zero page size selects [`DEFAULT_PAGE_SIZE`].
pub fn validate_pagination(page_size: i32, offset: i32) -> Result<Page> {
    let resource = ResourceRef::kind(ResourceType::Registry);
    if offset < 0 {
        return Err(CatalogError::invalid_argument(resource, "invalid pagination: offset must not be negative"));
    }
    if page_size < 0 {
        return Err(CatalogError::invalid_argument(resource, "invalid pagination: pageSize must not be negative"));
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(CatalogError::invalid_argument(
            resource,
            format!("invalid pagination: pageSize must not exceed {}", MAX_PAGE_SIZE),
        ));
    }

    let limit = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
    Ok(Page { limit: i64::from(limit), offset: i64::from(offset) })
}
