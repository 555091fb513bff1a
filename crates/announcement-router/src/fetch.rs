//! Raw event resolution.

use crate::{Event, FetchError, RawEvent, RouteError, RouteResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Resolves raw notifications into full events.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch_event(&self, raw: &RawEvent) -> Result<Event, FetchError>;
}

#[async_trait]
impl<F: EventFetcher + ?Sized> EventFetcher for Arc<F> {
    async fn fetch_event(&self, raw: &RawEvent) -> Result<Event, FetchError> {
        (**self).fetch_event(raw).await
    }
}

/// Fetch with a small fixed budget, sleeping `2^attempt` seconds between tries.
///
/// Returns `Ok(None)` when the message is gone or unreadable; those are not
/// retried.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    raw: &RawEvent,
    attempts: u32,
    cancel: &CancellationToken,
) -> RouteResult<Option<Event>>
where
    F: EventFetcher + ?Sized,
{
    let attempts = attempts.max(1);
    let mut last = String::new();

    for attempt in 0..attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RouteError::Cancelled),
            r = fetcher.fetch_event(raw) => r,
        };

        match result {
            Ok(event) => return Ok(Some(event)),
            Err(e) if e.is_permanent() => {
                warn!(event_id = %raw.event_id, channel = %raw.channel_id, error = %e, "skipping raw event");
                return Ok(None);
            }
            Err(e) => {
                last = e.to_string();
                if attempt + 1 == attempts {
                    break;
                }
                let delay = Duration::from_secs(2u64.saturating_pow(attempt));
                warn!(
                    event_id = %raw.event_id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "fetch failed, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RouteError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    Err(RouteError::FetchExhausted { attempts, last })
}
