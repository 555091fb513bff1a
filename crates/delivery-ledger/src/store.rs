use crate::{DeliveryLedger, FailureRecord, ProcessedSet};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    processed: ProcessedSet,
    ledger: DeliveryLedger,
}

/// Shared handle over the dedup set and the ledger.
///
/// Cloning is cheap; every clone sees the same state. All access goes
/// through a single lock, so the router's test-and-set, the engine's writes
/// and the eviction sweep never interleave mid-operation.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStore {
    inner: Arc<Mutex<Inner>>,
}

/// Counts removed by one eviction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl EvictionReport {
    pub fn total(&self) -> usize {
        self.processed + self.succeeded + self.failed
    }
}

/// Read-only view of the ledger after a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub succeeded_count: usize,
    /// Failures inside the window, oldest first.
    pub failed_records: Vec<FailureRecord>,
    /// Event ids accepted for processing inside the window.
    pub processed_count: usize,
}

impl DeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `event_id` as processed.
    ///
    /// Returns `false` if the id was already present; the caller must then
    /// drop the event.
    pub fn try_mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> bool {
        self.inner.lock().processed.insert_if_absent(event_id, at)
    }

    pub fn is_processed(&self, event_id: &str) -> bool {
        self.inner.lock().processed.contains(event_id)
    }

    pub fn record_success(&self, event_id: &str, at: DateTime<Utc>) {
        self.inner.lock().ledger.record_success(event_id, at);
    }

    pub fn record_failure(&self, record: FailureRecord) {
        self.inner.lock().ledger.record_failure(record);
    }

    pub fn succeeded_at(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.inner.lock().ledger.succeeded_at(event_id)
    }

    /// All failure records currently held, oldest first.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.inner.lock().ledger.failures().to_vec()
    }

    /// Remove every entry whose timestamp is before `cutoff`.
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> EvictionReport {
        let mut inner = self.inner.lock();
        let processed = inner.processed.evict_older_than(cutoff);
        let (succeeded, failed) = inner.ledger.evict_older_than(cutoff);
        let report = EvictionReport {
            processed,
            succeeded,
            failed,
        };
        debug!(
            cutoff = %cutoff,
            processed,
            succeeded,
            failed,
            "evicted ledger entries"
        );
        report
    }

    /// Entries with a timestamp strictly after `since`.
    pub fn snapshot_window(&self, since: DateTime<Utc>) -> WindowSnapshot {
        let inner = self.inner.lock();
        WindowSnapshot {
            succeeded_count: inner.ledger.succeeded_since(since),
            failed_records: inner.ledger.failures_since(since),
            processed_count: inner.processed.count_since(since),
        }
    }
}
