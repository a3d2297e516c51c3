//! # Error Types
//!
//! Error taxonomy for the registry catalog using `thiserror`.
//!
//! Caller-facing variants carry the resource kind, an optional resource name and
//! a short cause. Database and internal failures render a fixed message; the
//! underlying error is logged when the error is built and stays reachable through
//! [`std::error::Error::source`].

use std::fmt;

use crate::secrets::SecretsError;

/// Custom result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Kind of catalog resource an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Registry,
    Application,
    Project,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Registry => "registry",
            ResourceType::Application => "application",
            ResourceType::Project => "project",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource identification attached to caller-facing errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceRef {
    pub resource_type: Option<ResourceType>,
    pub name: Option<String>,
}

impl ResourceRef {
    pub fn registry(name: impl Into<String>) -> Self {
        Self { resource_type: Some(ResourceType::Registry), name: Some(name.into()) }
    }

    pub fn kind(resource_type: ResourceType) -> Self {
        Self { resource_type: Some(resource_type), name: None }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(resource_type) = self.resource_type {
            write!(f, "{} ", resource_type)?;
        }
        if let Some(name) = &self.name {
            write!(f, "{} ", name)?;
        }
        Ok(())
    }
}

/// Main error type for the registry catalog
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Malformed or missing input, immutable-field violations
    #[error("{resource}invalid: {message}")]
    InvalidArgument { resource: ResourceRef, message: String },

    /// Tenant-scoped resource does not exist
    #[error("{resource}not found{}", suffix(.message))]
    NotFound { resource: ResourceRef, message: String },

    /// Uniqueness violation (registry name or display name)
    #[error("{resource}already exists: {message}")]
    AlreadyExists { resource: ResourceRef, message: String },

    /// Resource is in use or the requested transition is not allowed
    #[error("{resource}failed precondition: {message}")]
    FailedPrecondition { resource: ResourceRef, message: String },

    /// Authorization checker rejected the request
    #[error("access denied{}", suffix(.message))]
    PermissionDenied { message: String },

    /// A consumer could not be served (e.g. a watcher fell behind)
    #[error("unavailable: {message}")]
    Unavailable { message: String },

    /// Transactional store failure; the store's text is never rendered
    #[error("an internal database error occurred")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Any secret backend failure: login, read, write, delete, decode
    #[error("failed to access secret service")]
    SecretBackend {
        #[source]
        source: SecretsError,
        context: String,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Internal server errors
    #[error("internal error")]
    Internal { message: String },
}

fn suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

impl CatalogError {
    /// Create an invalid-argument error for the given resource
    pub fn invalid_argument<M: Into<String>>(resource: ResourceRef, message: M) -> Self {
        Self::InvalidArgument { resource, message: message.into() }
    }

    /// Shorthand for the common "incomplete request" rejection
    pub fn incomplete_request(resource_type: ResourceType) -> Self {
        Self::invalid_argument(ResourceRef::kind(resource_type), "incomplete request")
    }

    pub fn not_found(resource: ResourceRef) -> Self {
        Self::NotFound { resource, message: String::new() }
    }

    pub fn already_exists<M: Into<String>>(resource: ResourceRef, message: M) -> Self {
        Self::AlreadyExists { resource, message: message.into() }
    }

    pub fn failed_precondition<M: Into<String>>(resource: ResourceRef, message: M) -> Self {
        Self::FailedPrecondition { resource, message: message.into() }
    }

    pub fn permission_denied<M: Into<String>>(message: M) -> Self {
        Self::PermissionDenied { message: message.into() }
    }

    pub fn unavailable<M: Into<String>>(message: M) -> Self {
        Self::Unavailable { message: message.into() }
    }

    /// Wrap a store failure. The cause is logged here and not rendered.
    pub fn database<C: Into<String>>(source: sqlx::Error, context: C) -> Self {
        let context = context.into();
        tracing::error!(error = %source, context = %context, "database operation failed");
        Self::Database { source, context }
    }

    /// Wrap a secret backend failure. The cause is logged here and not rendered.
    pub fn secret_backend<C: Into<String>>(source: SecretsError, context: C) -> Self {
        let context = context.into();
        tracing::error!(error = %source, context = %context, "secret backend operation failed");
        Self::SecretBackend { source, context }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        tracing::error!(message = %message, "internal error");
        Self::Internal { message }
    }

    /// gRPC status code the RPC layer should report for this error
    pub fn code(&self) -> tonic::Code {
        match self {
            CatalogError::InvalidArgument { .. } => tonic::Code::InvalidArgument,
            CatalogError::NotFound { .. } => tonic::Code::NotFound,
            CatalogError::AlreadyExists { .. } => tonic::Code::AlreadyExists,
            CatalogError::FailedPrecondition { .. } => tonic::Code::FailedPrecondition,
            CatalogError::PermissionDenied { .. } => tonic::Code::PermissionDenied,
            CatalogError::Unavailable { .. } => tonic::Code::Unavailable,
            CatalogError::Database { .. }
            | CatalogError::SecretBackend { .. }
            | CatalogError::Config { .. }
            | CatalogError::Internal { .. } => tonic::Code::Internal,
        }
    }

    /// True for transient backend failures a caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::Database { .. }
                | CatalogError::SecretBackend { .. }
                | CatalogError::Unavailable { .. }
        )
    }
}

impl From<CatalogError> for tonic::Status {
    fn from(error: CatalogError) -> Self {
        tonic::Status::new(error.code(), error.to_string())
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::invalid_argument(ResourceRef::kind(ResourceType::Registry), message)
    }
}
