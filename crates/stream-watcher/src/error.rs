//! Watcher error types.

use thiserror::Error;

/// Error type for the streaming-platform client.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client credentials were rejected
    #[error("Authentication failed: HTTP {0}")]
    Auth(u16),

    /// Non-success API response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result type alias using WatcherError.
pub type WatcherResult<T> = Result<T, WatcherError>;
