//! Caller identity and request authorization.

pub mod authorization;
pub mod context;

pub use authorization::{AllowAllAuthorizer, Authorizer, ScopeAuthorizer, ADMIN_ALL_SCOPE};
pub use context::{RequestContext, ADMIN_PROJECT_ID};
