//! Behavior once shutdown begins.

use super::harness::{announcement, cached, raw, TestHarness};
use crate::{FetchError, RouteDecision};
use herald_lifecycle::LifecycleState;
use publish_retry_engine::PublishError;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn events_after_shutdown_are_ignored() {
    let h = TestHarness::new();
    h.lifecycle.request_shutdown();

    assert_eq!(
        h.router.on_event(cached(announcement("4001"))).await,
        RouteDecision::ShuttingDown
    );
    assert!(h.router.dispatch(cached(announcement("4002"))).is_none());
    assert_eq!(h.publisher.call_count(), 0);
    assert!(!h.store.is_processed("4001"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_rate_limit_sleep_without_ledger_entry() {
    let h = TestHarness::new();
    h.publisher.push(Err(PublishError::RateLimited {
        retry_after: Some(Duration::from_secs(60)),
    }));

    let handle = h.router.dispatch(cached(announcement("4003"))).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.publisher.call_count(), 1);

    let started = Instant::now();
    h.lifecycle.request_shutdown();
    handle.await.unwrap();
    h.lifecycle.await_shutdown_complete().await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(h.publisher.call_count(), 1);
    assert!(h.store.succeeded_at("4003").is_none());
    assert!(h.store.failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_fetch_backoff() {
    let h = TestHarness::new();
    let event = announcement("4004");
    h.fetcher.insert(event.clone());
    h.fetcher.fail_next(FetchError::Transient("HTTP 502".into()));

    let router = h.router.clone();
    let task = tokio::spawn(async move { router.on_event(raw(&event)).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.lifecycle.request_shutdown();

    assert_eq!(task.await.unwrap(), RouteDecision::Cancelled);
    assert_eq!(h.fetcher.call_count(), 1);
    assert!(h.store.failures().is_empty());
}
