//! Common error types for taskmirror.

use thiserror::Error;

/// Top-level error type for taskmirror operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials are invalid, expired or could not be refreshed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transient transport failure (connection, timeout, 429, 5xx).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-transient API failure reported by a provider.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider refused access to the resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A target record is missing a required field.
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// A reconciliation cycle is already running.
    #[error("Sync already in progress")]
    Busy,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }

    /// Whether the error is fatal to a whole reconciliation cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
