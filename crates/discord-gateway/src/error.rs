//! Gateway error types.

use thiserror::Error;

/// Gateway error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform rejected the credential
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The session cannot continue (bad intents, sharding, API version)
    #[error("Fatal gateway close {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    /// Non-success API response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Protocol violation or unexpected payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The REST client was closed during shutdown
    #[error("Client closed")]
    Closed,
}

impl GatewayError {
    /// Errors that must stop the process rather than trigger a reconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Unauthorized(_) | GatewayError::FatalClose { .. }
        )
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;
