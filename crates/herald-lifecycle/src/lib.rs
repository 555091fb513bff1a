//! Lifecycle management for herald.
//!
//! Owns the `Running -> ShuttingDown -> Stopped` state machine, readiness,
//! background task supervision, the ledger eviction schedule, and OS signal
//! handling.

mod coordinator;
mod eviction;
mod signals;

use thiserror::Error;

pub use coordinator::{LifecycleCoordinator, LifecycleState};
pub use eviction::{spawn_eviction_task, sweep, EvictionSchedule};
pub use signals::{install_signal_handler, wait_for_termination};

/// Errors from lifecycle management.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type alias using LifecycleError.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
