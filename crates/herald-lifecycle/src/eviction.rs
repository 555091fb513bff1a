//! Periodic ledger eviction.

use crate::LifecycleCoordinator;
use chrono::{DateTime, Utc};
use delivery_ledger::{DeliveryStore, EvictionReport};
use std::time::Duration;
use tracing::{debug, info};

/// Retention policy for the delivery store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionSchedule {
    /// Maximum entry age.
    pub retention: Duration,
    /// Sweep period.
    pub interval: Duration,
}

impl Default for EvictionSchedule {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Remove every entry older than `now - retention`.
pub fn sweep(store: &DeliveryStore, retention: Duration, now: DateTime<Utc>) -> EvictionReport {
    let cutoff = chrono::Duration::from_std(retention)
        .ok()
        .and_then(|r| now.checked_sub_signed(r))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    store.evict_older_than(cutoff)
}

/// Spawn the eviction loop as a registered background task.
///
/// The loop waits for readiness before its first sweep and exits as soon as
/// shutdown begins.
pub fn spawn_eviction_task(
    lifecycle: &LifecycleCoordinator,
    store: DeliveryStore,
    schedule: EvictionSchedule,
) {
    let coordinator = lifecycle.clone();
    lifecycle.spawn_background("ledger-eviction", async move {
        run(coordinator, store, schedule).await;
    });
}

async fn run(lifecycle: LifecycleCoordinator, store: DeliveryStore, schedule: EvictionSchedule) {
    if !lifecycle.wait_ready().await {
        debug!("shutdown before ready, eviction never started");
        return;
    }

    let cancel = lifecycle.cancellation_token();
    info!(
        retention_secs = schedule.retention.as_secs(),
        interval_secs = schedule.interval.as_secs(),
        "ledger eviction scheduled"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(schedule.interval) => {}
        }

        let report = sweep(&store, schedule.retention, Utc::now());
        if report.total() > 0 {
            info!(
                processed = report.processed,
                succeeded = report.succeeded,
                failed = report.failed,
                "evicted stale ledger entries"
            );
        }
    }

    debug!("ledger eviction stopped");
}
