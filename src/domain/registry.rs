//! Registry domain types
//!
//! A registry is a named source of application artifacts (a Helm chart
//! repository or a container image registry) owned by a project. Its
//! credentials live in a separate [`RegistrySecret`] whose storage location
//! depends on the configured secret backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::validation::REGISTRY_NAME_RE;

/// API value of the CA field that selects the platform's dynamically loaded CA.
pub const DYNAMIC_CA_CERTS_NAME: &str = "use-dynamic-cacert";

/// Kind of artifacts a registry serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryType {
    #[serde(rename = "HELM", alias = "helm")]
    Helm,
    #[serde(rename = "IMAGE", alias = "image")]
    Image,
}

impl RegistryType {
    /// Get the database representation of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helm => "HELM",
            Self::Image => "IMAGE",
        }
    }
}

impl FromStr for RegistryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HELM" => Ok(Self::Helm),
            "IMAGE" => Ok(Self::Image),
            _ => Err(format!("Unknown registry type: {}", s)),
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PEM text of an explicitly supplied CA bundle (possibly empty).
///
/// Only built through [`CaCertificates::from_api`], so it never holds the
/// dynamic-CA marker.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PemBundle(String);

impl PemBundle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// CA certificates used to reach a registry.
#[derive(Clone, PartialEq, Eq)]
pub enum CaCertificates {
    /// PEM bundle supplied with the registry
    Explicit(PemBundle),
    /// Resolve to the platform CA bundle at read time
    UseDynamicPlatformCa,
}

impl CaCertificates {
    /// Convert the API string form, recognising the dynamic-CA marker.
    pub fn from_api(value: &str) -> Self {
        if value == DYNAMIC_CA_CERTS_NAME {
            Self::UseDynamicPlatformCa
        } else {
            Self::Explicit(PemBundle(value.to_string()))
        }
    }

    /// API string form; the dynamic marker renders as [`DYNAMIC_CA_CERTS_NAME`].
    pub fn to_api(&self) -> String {
        match self {
            Self::Explicit(pem) => pem.as_str().to_string(),
            Self::UseDynamicPlatformCa => DYNAMIC_CA_CERTS_NAME.to_string(),
        }
    }
}

impl Default for CaCertificates {
    fn default() -> Self {
        Self::Explicit(PemBundle::default())
    }
}

impl fmt::Debug for CaCertificates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(pem) => write!(f, "Explicit({} bytes)", pem.as_str().len()),
            Self::UseDynamicPlatformCa => f.write_str("UseDynamicPlatformCa"),
        }
    }
}

/// Sensitive sub-record of a registry.
///
/// Has no identity of its own: it is created, replaced and deleted together
/// with the owning registry. Its persisted form is produced by
/// [`crate::secrets::SecretCodec`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RegistrySecret {
    pub root_url: String,
    pub inventory_url: String,
    pub username: String,
    pub auth_token: String,
    pub ca_certs: CaCertificates,
}

impl RegistrySecret {
    /// Extract the sensitive fields from an API registry value.
    pub fn from_registry(registry: &Registry) -> Self {
        Self {
            root_url: registry.root_url.clone(),
            inventory_url: registry.inventory_url.clone(),
            username: registry.username.clone(),
            auth_token: registry.auth_token.clone(),
            ca_certs: CaCertificates::from_api(&registry.ca_certs),
        }
    }
}

impl fmt::Debug for RegistrySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySecret")
            .field("root_url", &self.root_url)
            .field("inventory_url", &self.inventory_url)
            .field("username", &"[REDACTED]")
            .field("auth_token", &"[REDACTED]")
            .field("ca_certs", &self.ca_certs)
            .finish()
    }
}

/// Public view of a registry, used both as request payload and response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[validate(regex(
        path = *REGISTRY_NAME_RE,
        message = "value does not match regex pattern \"^[a-z0-9][a-z0-9-]{0,38}[a-z0-9]{0,1}$\""
    ))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 40, message = "value length must be at most 40 characters"))]
    pub display_name: String,

    #[serde(default)]
    #[validate(length(max = 2000, message = "value length must be at most 2000 characters"))]
    pub description: String,

    #[validate(length(min = 1, max = 1024, message = "value length must be between 1 and 1024 characters"))]
    pub root_url: String,

    #[serde(default)]
    #[validate(length(max = 1024, message = "value length must be at most 1024 characters"))]
    pub inventory_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub auth_token: String,

    #[serde(default)]
    pub ca_certs: String,

    #[serde(rename = "type")]
    pub registry_type: RegistryType,

    #[serde(default)]
    pub api_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Registry {
    /// Minimal registry value, mostly useful to build requests.
    pub fn new(name: impl Into<String>, registry_type: RegistryType, root_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            root_url: root_url.into(),
            inventory_url: String::new(),
            username: String::new(),
            auth_token: String::new(),
            ca_certs: String::new(),
            registry_type,
            api_type: String::new(),
            create_time: None,
            update_time: None,
        }
    }

    /// Blank out the fields that require the sensitive-info permission.
    pub fn redact_sensitive(&mut self) {
        self.username.clear();
        self.auth_token.clear();
        self.ca_certs.clear();
    }

    /// Copy with sensitive fields blanked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.redact_sensitive();
        copy
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("registry_type", &self.registry_type)
            .field("root_url", &self.root_url)
            .field("inventory_url", &self.inventory_url)
            .field("api_type", &self.api_type)
            .field("has_credentials", &(!self.username.is_empty() || !self.auth_token.is_empty()))
            .field("create_time", &self.create_time)
            .field("update_time", &self.update_time)
            .finish()
    }
}
