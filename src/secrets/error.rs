//! Error types for secret backend operations.

use thiserror::Error;

/// Result type for secret backend operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors raised by the codec, the scope key builder and the secret backends.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The backend holds nothing under this key (explicit 404 on read).
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// Tenant or registry name cannot be turned into a scope key.
    #[error("Invalid secret key: {key} - {reason}")]
    InvalidKey { key: String, reason: String },

    /// Login handshake failed or the session has been closed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Transport level failure talking to a remote backend.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote backend answered with a status the protocol does not allow.
    #[error("Unexpected status {status} from {operation}")]
    UnexpectedStatus { operation: String, status: u16 },

    /// Remote backend answered with a body that does not match the protocol.
    #[error("Malformed response from {operation}: {reason}")]
    MalformedResponse { operation: String, reason: String },

    /// Stored payload could not be decoded into a registry secret.
    #[error("Failed to decode secret payload: {reason}")]
    Decode { reason: String },

    /// Inline backend could not reach the registry row.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Local file access (identity token, CA bundle).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecretsError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into(), reason: reason.into() }
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    pub fn unexpected_status(operation: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus { operation: operation.into(), status }
    }

    pub fn malformed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse { operation: operation.into(), reason: reason.into() }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode { reason: reason.into() }
    }

    /// True only for explicit absence, never for structural failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
