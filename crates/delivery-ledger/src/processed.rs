use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Event ids that have been accepted for delivery.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    entries: HashMap<String, DateTime<Utc>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `event_id` unless already present.
    ///
    /// Returns `true` when the id was newly inserted.
    pub fn insert_if_absent(&mut self, event_id: &str, at: DateTime<Utc>) -> bool {
        if self.entries.contains_key(event_id) {
            return false;
        }
        self.entries.insert(event_id.to_string(), at);
        true
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.entries.contains_key(event_id)
    }

    pub fn processed_at(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(event_id).copied()
    }

    /// Drop entries older than `cutoff`, returning how many were removed.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, at| *at >= cutoff);
        before - self.entries.len()
    }

    /// Entries strictly after `since`.
    pub fn count_since(&self, since: DateTime<Utc>) -> usize {
        self.entries.values().filter(|at| **at > since).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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
    fn insert_is_test_and_set() {
        let mut set = ProcessedSet::new();
        assert!(set.insert_if_absent("a", t0()));
        assert!(!set.insert_if_absent("a", t0() + Duration::seconds(1)));
        assert_eq!(set.processed_at("a"), Some(t0()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn evict_keeps_entries_at_cutoff() {
        let mut set = ProcessedSet::new();
        set.insert_if_absent("old", t0());
        set.insert_if_absent("edge", t0() + Duration::hours(1));
        set.insert_if_absent("new", t0() + Duration::hours(2));

        let removed = set.evict_older_than(t0() + Duration::hours(1));
        assert_eq!(removed, 1);
        assert!(!set.contains("old"));
        assert!(set.contains("edge"));
        assert!(set.contains("new"));
    }
}
