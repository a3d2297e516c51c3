//! Authorization of registry requests.
//!
//! Scope patterns understood by [`ScopeAuthorizer`]:
//! - `admin:all` - bypass every check
//! - `{resource}:{action}` - e.g. `registries:read`
//! - `team:{project}:{resource}:{action}` - the same, limited to one project

use async_trait::async_trait;
use tracing::debug;

use super::context::RequestContext;
use crate::errors::{CatalogError, Result};

/// Admin bypass scope that grants access to all resources across all projects.
pub const ADMIN_ALL_SCOPE: &str = "admin:all";

const REGISTRIES_RESOURCE: &str = "registries";

/// Gatekeeper consulted after input validation and before any transaction opens.
#[async_trait]
pub trait Authorizer: Send + Sync + std::fmt::Debug {
    /// `request_name` is the operation's request type, e.g. `GetRegistryWithSensitiveInfoRequest`
    async fn check(&self, ctx: &RequestContext, project_id: &str, request_name: &str) -> Result<()>;
}

/// Accepts everything; used when authorization is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn check(&self, _ctx: &RequestContext, project_id: &str, request_name: &str) -> Result<()> {
        debug!(project_id = %project_id, request = %request_name, "Authorization disabled, allowing request");
        Ok(())
    }
}

/// Checks the caller's scopes against the action a request needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeAuthorizer;

/// Action required by a registry request, `None` for unknown requests
pub fn required_action(request_name: &str) -> Option<&'static str> {
    match request_name {
        "GetRegistryRequest" | "ListRegistriesRequest" | "WatchRegistriesRequest" => Some("read"),
        "GetRegistryWithSensitiveInfoRequest"
        | "ListRegistriesWithSensitiveInfoRequest"
        | "WatchRegistriesWithSensitiveInfoRequest" => Some("read-sensitive"),
        "CreateRegistryRequest" | "UpdateRegistryRequest" | "DeleteRegistryRequest" => Some("write"),
        _ => None,
    }
}

/// Check if the context has access to perform an action on a resource.
pub fn check_resource_access(ctx: &RequestContext, resource: &str, action: &str, project: Option<&str>) -> bool {
    if ctx.has_scope(ADMIN_ALL_SCOPE) {
        return true;
    }

    if ctx.has_scope(&format!("{}:{}", resource, action)) {
        return true;
    }

    if let Some(project) = project {
        if ctx.has_scope(&format!("team:{}:{}:{}", project, resource, action)) {
            return true;
        }
    }

    false
}

#[async_trait]
impl Authorizer for ScopeAuthorizer {
    async fn check(&self, ctx: &RequestContext, project_id: &str, request_name: &str) -> Result<()> {
        let Some(action) = required_action(request_name) else {
            return Err(CatalogError::permission_denied(format!("unknown request {}", request_name)));
        };

        if check_resource_access(ctx, REGISTRIES_RESOURCE, action, Some(project_id)) {
            return Ok(());
        }

        debug!(
            project_id = %project_id,
            request = %request_name,
            action = %action,
            user = ?ctx.user,
            "Request denied by scope check"
        );
        Err(CatalogError::permission_denied(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_all() {
        let ctx = RequestContext::anonymous();
        assert!(AllowAllAuthorizer.check(&ctx, "p1", "DeleteRegistryRequest").await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_bypass() {
        let ctx = RequestContext::new("p1").with_scopes([ADMIN_ALL_SCOPE]);
        assert!(ScopeAuthorizer.check(&ctx, "p1", "DeleteRegistryRequest").await.is_ok());
    }

    #[tokio::test]
    async fn test_sensitive_read_needs_its_own_scope() {
        let ctx = RequestContext::new("p1").with_scopes(["registries:read"]);
        assert!(ScopeAuthorizer.check(&ctx, "p1", "GetRegistryRequest").await.is_ok());

        let err = ScopeAuthorizer.check(&ctx, "p1", "GetRegistryWithSensitiveInfoRequest").await.unwrap_err();
        assert!(matches!(err, CatalogError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_team_scope_is_project_bound() {
        let ctx = RequestContext::new("p1").with_scopes(["team:p1:registries:write"]);
        assert!(ScopeAuthorizer.check(&ctx, "p1", "CreateRegistryRequest").await.is_ok());
        assert!(ScopeAuthorizer.check(&ctx, "p2", "CreateRegistryRequest").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_request_is_denied() {
        let ctx = RequestContext::new("p1").with_scopes(["registries:write"]);
        assert!(ScopeAuthorizer.check(&ctx, "p1", "DropDatabaseRequest").await.is_err());
    }
}
