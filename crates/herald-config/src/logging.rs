//! Logging initialization for herald.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `~/.herald/logs/herald.jsonl` and a compact copy to stderr.

use std::path::PathBuf;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalize a level name, falling back to `info` for unknown values.
pub fn parse_level(level: &str) -> &'static str {
    let lower = level.trim().to_ascii_lowercase();
    let lower = match lower.as_str() {
        "warning" => "warn",
        "critical" | "fatal" => "error",
        other => other,
    };
    LEVELS
        .iter()
        .copied()
        .find(|l| *l == lower)
        .unwrap_or(crate::DEFAULT_LOG_LEVEL)
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// ```ignore
/// init_logging("info", None);
/// tracing::info!("herald starting");
/// ```
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: "herald".into(),
        default_level: parse_level(level).into(),
        log_path,
        also_stderr: true,
    });
}
