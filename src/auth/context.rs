//! Caller context attached to every registry operation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::{CatalogError, ResourceRef, ResourceType, Result};

/// Project whose callers act on behalf of the whole platform
pub const ADMIN_PROJECT_ID: &str = "default";

static PROJECT_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("Project id regex is valid at compile time")
});

/// Identity of the caller as seen by the transport layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Active project (tenant) of the request
    pub project_id: Option<String>,
    pub user: Option<String>,
    /// Peer address, when the transport knows it
    pub client: Option<String>,
    scopes: HashSet<String>,
}

impl RequestContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self { project_id: Some(project_id.into()), ..Self::default() }
    }

    /// Context without an active project
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Active project, rejecting a missing, blank or malformed identifier
    pub fn resolve_project(&self) -> Result<String> {
        let project = self.project_id.as_deref().map(str::trim).unwrap_or_default();
        if project.is_empty() {
            return Err(CatalogError::invalid_argument(
                ResourceRef::kind(ResourceType::Project),
                "incomplete request: missing active project",
            ));
        }
        if !PROJECT_ID_RE.is_match(project) {
            return Err(CatalogError::invalid_argument(
                ResourceRef::kind(ResourceType::Project),
                format!("malformed project identifier '{}'", project),
            ));
        }
        Ok(project.to_string())
    }

    /// Like [`Self::resolve_project`], but an admin-project caller may act on `fallback`.
    pub fn resolve_project_allow_admin(&self, fallback: &str) -> Result<String> {
        let project = self.resolve_project()?;
        if project == ADMIN_PROJECT_ID && !fallback.is_empty() {
            if !PROJECT_ID_RE.is_match(fallback) {
                return Err(CatalogError::invalid_argument(
                    ResourceRef::kind(ResourceType::Project),
                    format!("malformed project identifier '{}'", fallback),
                ));
            }
            return Ok(fallback.to_string());
        }
        Ok(project)
    }
}
