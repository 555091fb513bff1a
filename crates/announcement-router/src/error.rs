//! Routing error types.

use thiserror::Error;

/// Failure resolving a raw event into a full event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The message no longer exists
    #[error("not found: {0}")]
    NotFound(String),

    /// No permission to read the message
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Anything that may succeed on retry
    #[error("transient error: {0}")]
    Transient(String),
}

impl FetchError {
    /// Not found and forbidden are never retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::NotFound(_) | FetchError::Forbidden(_))
    }
}

/// Routing error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Fetch attempts exhausted
    #[error("fetch failed after {attempts} attempts: {last}")]
    FetchExhausted { attempts: u32, last: String },

    /// Shutdown interrupted the work
    #[error("cancelled by shutdown")]
    Cancelled,
}

/// Result type alias using RouteError.
pub type RouteResult<T> = Result<T, RouteError>;
