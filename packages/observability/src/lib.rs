//! # Observability
//!
//! Shared logging layer for the herald crates.
//!
//! Crates are **log producers** only. The binary calls
//! [`init_with_config`] once at startup and every crate uses the standard
//! `tracing` macros with structured fields. Where lines end up is decided
//! here:
//!
//! - a JSONL file (`~/.herald/logs/herald.jsonl` by default), one object per
//!   line with timestamp, level, service, pid, target, message and fields
//! - optionally a compact human-readable stderr stream for foreground runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "herald".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod file_writer;
mod json_layer;

use std::path::PathBuf;

pub use file_writer::{default_log_path, CentralLogWriter};
pub use json_layer::LogEntry;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default level filter (e.g. "debug", "info", "warn").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Custom log file path. Defaults to `~/.herald/logs/herald.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "herald".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Falls back to stderr-only output if the log file cannot be opened, so a
/// read-only home directory never prevents the process from starting.
pub fn init_with_config(config: LogConfig) {
    if let Err(e) = file_writer::init_subscriber(&config) {
        use tracing_subscriber::util::SubscriberInitExt;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
            )
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .finish()
            .try_init();
        tracing::warn!(error = %e, "log file unavailable, logging to stderr only");
    }
}
