//! Raw event resolution.

use super::harness::{announcement, raw, TestHarness};
use crate::{FetchError, RouteDecision};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn not_found_is_skipped_without_retry() {
    let h = TestHarness::new();
    let event = announcement("3001");

    assert_eq!(h.router.on_event(raw(&event)).await, RouteDecision::FetchSkipped);
    assert_eq!(h.fetcher.call_count(), 1);
    assert_eq!(h.publisher.call_count(), 0);
    assert!(h.store.failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn forbidden_is_skipped_without_retry() {
    let h = TestHarness::new();
    let event = announcement("3002");
    h.fetcher.insert(event.clone());
    h.fetcher.fail_next(FetchError::Forbidden("Missing Access".into()));

    assert_eq!(h.router.on_event(raw(&event)).await, RouteDecision::FetchSkipped);
    assert_eq!(h.fetcher.call_count(), 1);
    assert!(!h.store.is_processed("3002"));
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_errors_are_retried_with_backoff() {
    let h = TestHarness::new();
    let event = announcement("3003");
    h.fetcher.insert(event.clone());
    h.fetcher.fail_next(FetchError::Transient("HTTP 503".into()));
    h.fetcher.fail_next(FetchError::Transient("HTTP 503".into()));

    let started = Instant::now();
    let decision = h.router.on_event(raw(&event)).await;

    assert!(matches!(decision, RouteDecision::Delivered(_)));
    assert_eq!(h.fetcher.call_count(), 3);
    // 2^0 + 2^1 seconds
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(h.publisher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_fetch_records_failure() {
    let h = TestHarness::new();
    let event = announcement("3004");
    h.fetcher.insert(event.clone());
    for _ in 0..3 {
        h.fetcher.fail_next(FetchError::Transient("connection reset".into()));
    }

    let decision = h.router.on_event(raw(&event)).await;

    assert!(matches!(decision, RouteDecision::Failed(ref e) if e.contains("connection reset")));
    assert_eq!(h.fetcher.call_count(), 3);
    assert_eq!(h.publisher.call_count(), 0);

    let failures = h.store.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].event_id, "3004");
    assert_eq!(failures[0].destination_label, "1/900");
}
