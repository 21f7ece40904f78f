//! Error types for secret resolution.
//!
//! Absence is not modeled here: a key that no backend holds is `Ok(None)`
//! from every lookup, so fallback logic stays a plain branch. The variants
//! below cover the ways a backend or the resolver itself can actually fail.

use std::time::Duration;

use thiserror::Error;

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur while resolving secrets.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A backend could not be reached (network failure, unexpected response).
    #[error("Backend '{backend}' unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// Authentication with a backend failed.
    #[error("Authentication failed for backend '{backend}': {message}")]
    AuthenticationFailed { backend: String, message: String },

    /// A secret payload could not be parsed into fields.
    #[error("Malformed secret at '{path}': {reason}")]
    MalformedSecret { path: String, reason: String },

    /// A single backend call exceeded its time budget.
    #[error("Backend '{backend}' timed out after {elapsed:?}")]
    Timeout { backend: String, elapsed: Duration },

    /// Invalid resolver or backend configuration. Always fatal at
    /// construction time.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResolveError {
    /// Create a backend unavailable error.
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable { backend: backend.into(), message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn auth_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { backend: backend.into(), message: message.into() }
    }

    /// Create a malformed secret error.
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSecret { path: path.into(), reason: reason.into() }
    }

    /// Create a timeout error.
    pub fn timeout(backend: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout { backend: backend.into(), elapsed }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Whether this error counts as a backend failure for the purposes of
    /// the resolver's skip/abort policy. Configuration errors are never
    /// skippable.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. }
                | Self::AuthenticationFailed { .. }
                | Self::MalformedSecret { .. }
                | Self::Timeout { .. }
        )
    }
}
