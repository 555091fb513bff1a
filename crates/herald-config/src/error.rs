//! Core error types.

use thiserror::Error;

/// Error type for configuration and startup.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The platform credential is absent
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// The platform credential does not look like a bot token
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

impl CoreError {
    /// Whether this error is a credential problem (process exit code 1 at startup).
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            CoreError::MissingCredential(_) | CoreError::MalformedCredential(_)
        )
    }
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
