//! Request and response shapes of the registry operations.

use serde::{Deserialize, Serialize};

use super::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistryRequest {
    pub registry: Registry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRegistryRequest {
    pub registry_name: String,
    #[serde(default)]
    pub show_sensitive_info: bool,
}

/// Page request for listing registries. Zero `page_size` selects the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRegistriesRequest {
    #[serde(default)]
    pub show_sensitive_info: bool,
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub offset: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRegistriesResponse {
    pub registries: Vec<Registry>,
    pub total_elements: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRegistryRequest {
    /// Target registry; must equal `registry.name`
    pub registry_name: String,
    pub registry: Registry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRegistryRequest {
    pub registry_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRegistriesRequest {
    /// Project to watch when the caller acts from the admin project
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub no_replay: bool,
    #[serde(default)]
    pub show_sensitive_info: bool,
}
