//! Publish and engine error types.

use std::time::Duration;
use thiserror::Error;

/// How the engine treats a failed publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry after the advised delay (or the policy default).
    RateLimited { retry_after: Option<Duration> },
    /// Never retried.
    Permanent,
    /// Retried with exponential backoff.
    Transient,
}

/// Failure reported by a [`Publisher`](crate::Publisher).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Remote API asked us to slow down
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Missing permission or rejected credential
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Target no longer exists
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, server error or anything unexpected
    #[error("transient error: {0}")]
    Transient(String),
}

impl PublishError {
    /// Classify an HTTP-like status code.
    ///
    /// 429 is a rate limit, 401/403 forbidden, 404 not found. Everything else
    /// (5xx included) is transient.
    pub fn from_status(status: u16, retry_after: Option<Duration>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            429 => PublishError::RateLimited { retry_after },
            401 | 403 => PublishError::Forbidden(format!("HTTP {}: {}", status, detail)),
            404 => PublishError::NotFound(format!("HTTP {}: {}", status, detail)),
            _ => PublishError::Transient(format!("HTTP {}: {}", status, detail)),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PublishError::RateLimited { retry_after } => ErrorClass::RateLimited {
                retry_after: *retry_after,
            },
            PublishError::Forbidden(_) | PublishError::NotFound(_) => ErrorClass::Permanent,
            PublishError::Transient(_) => ErrorClass::Transient,
        }
    }

    /// Short reason recorded for permanent denials.
    pub fn permanent_reason(&self) -> Option<&'static str> {
        match self {
            PublishError::Forbidden(_) => Some("forbidden"),
            PublishError::NotFound(_) => Some("not found"),
            _ => None,
        }
    }
}

/// Longest advised wait honoured from a rate-limit response.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Extract the advised wait from a rate-limit response.
///
/// Prefers a JSON body field `retry_after` (seconds, may be fractional), then
/// a `Retry-After` header in whole seconds. Negative or non-numeric values
/// are ignored; oversized ones are capped at [`MAX_RETRY_AFTER`].
pub fn parse_retry_after(body: &str, header: Option<&str>) -> Option<Duration> {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("retry_after").and_then(|r| r.as_f64()));

    let secs = from_body.or_else(|| header.and_then(|h| h.trim().parse::<f64>().ok()))?;
    Duration::try_from_secs_f64(secs)
        .ok()
        .map(|wait| wait.min(MAX_RETRY_AFTER))
}

/// Engine error. Terminal delivery results are not errors; see
/// [`DeliveryOutcome`](crate::DeliveryOutcome).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Shutdown interrupted the delivery before a terminal outcome
    #[error("delivery cancelled by shutdown")]
    Cancelled,
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
