//! Channel class and author eligibility.

use super::harness::{announcement, cached, raw, raw_uncached, TestHarness};
use crate::{ChannelClass, Event, RouteDecision};
use publish_retry_engine::{DeliveryOutcome, PublishError};

#[tokio::test(start_paused = true)]
async fn other_channel_class_is_rejected() {
    let h = TestHarness::new();
    let event = Event {
        channel_class: ChannelClass::Other,
        ..announcement("2001")
    };

    assert_eq!(
        h.router.on_event(cached(event.clone())).await,
        RouteDecision::WrongChannelClass
    );
    assert_eq!(
        h.router.on_event(raw(&event)).await,
        RouteDecision::WrongChannelClass
    );
    assert_eq!(h.fetcher.call_count(), 0);
    assert_eq!(h.publisher.call_count(), 0);
    assert!(!h.store.is_processed("2001"));
}

#[tokio::test(start_paused = true)]
async fn uncached_raw_event_is_classified_after_fetch() {
    let h = TestHarness::new();
    let event = Event {
        channel_class: ChannelClass::Other,
        ..announcement("2002")
    };
    h.fetcher.insert(event.clone());

    assert_eq!(
        h.router.on_event(raw_uncached(&event)).await,
        RouteDecision::WrongChannelClass
    );
    assert_eq!(h.fetcher.call_count(), 1);
    assert_eq!(h.publisher.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn bot_author_without_webhook_is_rejected() {
    let h = TestHarness::new();
    let event = Event {
        author_is_bot: true,
        ..announcement("2003")
    };

    assert_eq!(
        h.router.on_event(cached(event)).await,
        RouteDecision::NotEligible
    );
    assert_eq!(h.publisher.call_count(), 0);
    assert!(!h.store.is_processed("2003"));
}

#[tokio::test(start_paused = true)]
async fn webhook_relayed_bot_message_is_published() {
    let h = TestHarness::new();
    let event = Event {
        author_is_bot: true,
        has_webhook_origin: true,
        ..announcement("2004")
    };

    assert!(matches!(
        h.router.on_event(cached(event)).await,
        RouteDecision::Delivered(_)
    ));
    assert_eq!(h.publisher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_event_does_not_block_later_eligible_copy() {
    let h = TestHarness::new();
    let bot_copy = Event {
        author_is_bot: true,
        ..announcement("2005")
    };

    h.router.on_event(cached(bot_copy)).await;
    assert!(matches!(
        h.router.on_event(cached(announcement("2005"))).await,
        RouteDecision::Delivered(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn missing_publish_permission_is_reported_per_event() {
    let h = TestHarness::new();
    h.publisher
        .push(Err(PublishError::Forbidden("Missing Permissions".into())));

    assert_eq!(
        h.router.on_event(cached(announcement("2006"))).await,
        RouteDecision::Delivered(DeliveryOutcome::PermanentlyDenied("forbidden".into()))
    );
    assert_eq!(h.publisher.call_count(), 1);

    let failures = h.store.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].event_id, "2006");
    assert_eq!(failures[0].error_summary, "forbidden");

    // Permission is not cached: the next announcement in the channel is attempted.
    assert!(matches!(
        h.router.on_event(cached(announcement("2007"))).await,
        RouteDecision::Delivered(DeliveryOutcome::Succeeded)
    ));
    assert_eq!(h.publisher.call_count(), 2);
}
