//! On-demand status summaries.
//!
//! Pure reads over the [`DeliveryStore`] plus the platform directory counts;
//! nothing here mutates state.

use chrono::{DateTime, Duration, Utc};
use delivery_ledger::{DeliveryStore, FailureRecord};
use serde::Serialize;
use std::sync::Arc;

/// Window covered by a summary.
const WINDOW_HOURS: i64 = 24;

/// Failures shown in a summary.
const RECENT_FAILURES: usize = 3;

/// Display length for error text.
pub const ERROR_DISPLAY_LEN: usize = 50;

/// Guild and channel counts from the platform session.
pub trait PlatformDirectory: Send + Sync {
    fn guild_count(&self) -> usize;
    /// Channels of the republished class.
    fn target_channel_count(&self) -> usize;
}

/// One failure as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureLine {
    pub event_id: String,
    pub destination: String,
    /// Truncated to [`ERROR_DISPLAY_LEN`] characters.
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl From<&FailureRecord> for FailureLine {
    fn from(record: &FailureRecord) -> Self {
        Self {
            event_id: record.event_id.clone(),
            destination: record.destination_label.clone(),
            error: truncate_error(&record.error_summary, ERROR_DISPLAY_LEN),
            failed_at: record.failed_at,
        }
    }
}

/// Point-in-time summary of the last 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub published_24h: usize,
    pub failed_24h: usize,
    /// Newest first, at most three.
    pub recent_failures: Vec<FailureLine>,
    pub guild_count: usize,
    pub channel_count: usize,
    pub uptime_secs: u64,
}

impl StatusSummary {
    /// Plain-text rendering for chat replies and logs.
    pub fn render(&self) -> String {
        let mut lines = vec![
            "**Herald status**".to_string(),
            format!("Published (last 24h): {}", self.published_24h),
            format!("Failed (last 24h): {}", self.failed_24h),
            format!(
                "Servers: {} | Announcement channels: {}",
                self.guild_count, self.channel_count
            ),
            format!("Uptime: {}", format_uptime(self.uptime_secs)),
        ];

        if !self.recent_failures.is_empty() {
            lines.push("Recent failures:".to_string());
            for failure in &self.recent_failures {
                lines.push(format!("• {}: {}", failure.destination, failure.error));
            }
        }

        lines.join("\n")
    }
}

/// Builds [`StatusSummary`] values on demand.
#[derive(Clone)]
pub struct StatusReporter {
    store: DeliveryStore,
    directory: Arc<dyn PlatformDirectory>,
    started_at: DateTime<Utc>,
}

impl StatusReporter {
    pub fn new(store: DeliveryStore, directory: Arc<dyn PlatformDirectory>, started_at: DateTime<Utc>) -> Self {
        Self {
            store,
            directory,
            started_at,
        }
    }

    /// Summary for the 24 hours before `now`. An entry exactly 24 hours old
    /// is outside the window.
    pub fn summary(&self, now: DateTime<Utc>) -> StatusSummary {
        let snapshot = self.store.snapshot_window(now - Duration::hours(WINDOW_HOURS));

        let mut failures = snapshot.failed_records;
        failures.reverse();
        failures.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));

        StatusSummary {
            published_24h: snapshot.succeeded_count,
            failed_24h: failures.len(),
            recent_failures: failures.iter().take(RECENT_FAILURES).map(FailureLine::from).collect(),
            guild_count: self.directory.guild_count(),
            channel_count: self.directory.target_channel_count(),
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

/// Truncate to `max` characters, appending an ellipsis when cut.
pub fn truncate_error(error: &str, max: usize) -> String {
    if error.chars().count() <= max {
        return error.to_string();
    }
    let mut cut: String = error.chars().take(max).collect();
    cut.push('…');
    cut
}

/// `Nd Nh Nm`.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}
