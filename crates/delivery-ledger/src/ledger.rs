use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A terminal delivery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub event_id: String,
    /// Human-readable destination, e.g. `guild/#channel` or `twitch/user`.
    pub destination_label: String,
    /// Full error text; display code truncates, the ledger never does.
    pub error_summary: String,
    pub failed_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        event_id: impl Into<String>,
        destination_label: impl Into<String>,
        error_summary: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            destination_label: destination_label.into(),
            error_summary: error_summary.into(),
            failed_at,
        }
    }
}

/// Outcomes of completed delivery cycles.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLedger {
    succeeded: HashMap<String, DateTime<Utc>>,
    failed: Vec<FailureRecord>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, event_id: &str, at: DateTime<Utc>) {
        self.succeeded.insert(event_id.to_string(), at);
    }

    /// Append a failure. Records stay in insertion order.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed.push(record);
    }

    pub fn succeeded_at(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.succeeded.get(event_id).copied()
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failed
    }

    pub fn succeeded_len(&self) -> usize {
        self.succeeded.len()
    }

    /// Drop entries older than `cutoff`. Returns `(succeeded, failed)` removed.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> (usize, usize) {
        let succeeded_before = self.succeeded.len();
        self.succeeded.retain(|_, at| *at >= cutoff);

        let failed_before = self.failed.len();
        self.failed.retain(|record| record.failed_at >= cutoff);

        (
            succeeded_before - self.succeeded.len(),
            failed_before - self.failed.len(),
        )
    }

    /// Successes strictly after `since`.
    pub fn succeeded_since(&self, since: DateTime<Utc>) -> usize {
        self.succeeded.values().filter(|at| **at > since).count()
    }

    /// Failures strictly after `since`, oldest first.
    pub fn failures_since(&self, since: DateTime<Utc>) -> Vec<FailureRecord> {
        self.failed
            .iter()
            .filter(|record| record.failed_at > since)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn failures_keep_insertion_order() {
        let mut ledger = DeliveryLedger::new();
        ledger.record_failure(FailureRecord::new("1", "g/#a", "forbidden", t0()));
        ledger.record_failure(FailureRecord::new("2", "g/#b", "timeout", t0()));
        let ids: Vec<_> = ledger.failures().iter().map(|r| r.event_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn window_queries_use_strict_boundary() {
        let mut ledger = DeliveryLedger::new();
        ledger.record_success("edge", t0());
        ledger.record_success("inside", t0() + Duration::seconds(1));
        ledger.record_failure(FailureRecord::new("f-edge", "x", "e", t0()));
        ledger.record_failure(FailureRecord::new("f-in", "x", "e", t0() + Duration::seconds(1)));

        assert_eq!(ledger.succeeded_since(t0()), 1);
        let failures = ledger.failures_since(t0());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event_id, "f-in");
    }

    #[test]
    fn evict_removes_from_both_collections() {
        let mut ledger = DeliveryLedger::new();
        ledger.record_success("old", t0());
        ledger.record_success("new", t0() + Duration::hours(25));
        ledger.record_failure(FailureRecord::new("old-f", "x", "e", t0()));

        let removed = ledger.evict_older_than(t0() + Duration::hours(1));
        assert_eq!(removed, (1, 1));
        assert!(ledger.succeeded_at("old").is_none());
        assert!(ledger.succeeded_at("new").is_some());
        assert!(ledger.failures().is_empty());
    }
}
