//! Process-level error type.

use discord_gateway::GatewayError;
use herald_config::CoreError;
use stream_watcher::WatcherError;
use thiserror::Error;

/// Errors that end the process.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Stream watcher error: {0}")]
    Watcher(#[from] WatcherError),
}

impl AppError {
    /// Missing, malformed or rejected bot credential.
    pub fn is_credential_error(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_credential_error(),
            AppError::Gateway(GatewayError::Unauthorized(_)) => true,
            _ => false,
        }
    }

    /// Process exit code. Every startup or runtime failure exits with 1.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type AppResult<T> = Result<T, AppError>;
