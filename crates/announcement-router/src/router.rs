//! The single ingress gate for both notification paths.

use crate::{fetch_with_retry, ChannelClass, Event, EventFetcher, Ingress, MessageRef, RouteError};
use chrono::Utc;
use delivery_ledger::FailureRecord;
use herald_lifecycle::LifecycleCoordinator;
use publish_retry_engine::{DeliveryJob, DeliveryOutcome, EngineError, Publisher, RetryEngine};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What happened to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Delivered(DeliveryOutcome),
    ShuttingDown,
    WrongChannelClass,
    NotEligible,
    Duplicate,
    /// Raw event could not be read (gone or forbidden).
    FetchSkipped,
    /// Recorded as a ledger failure.
    Failed(String),
    /// Interrupted by shutdown; nothing recorded.
    Cancelled,
}

/// Routes events from both paths through one dedup gate.
pub struct Router<P, F>
where
    P: Publisher<Target = MessageRef>,
    F: EventFetcher,
{
    engine: RetryEngine,
    publisher: Arc<P>,
    fetcher: Arc<F>,
    lifecycle: LifecycleCoordinator,
    fetch_attempts: u32,
}

impl<P, F> Router<P, F>
where
    P: Publisher<Target = MessageRef> + 'static,
    F: EventFetcher + 'static,
{
    pub fn new(
        engine: RetryEngine,
        publisher: Arc<P>,
        fetcher: Arc<F>,
        lifecycle: LifecycleCoordinator,
        fetch_attempts: u32,
    ) -> Self {
        Self {
            engine,
            publisher,
            fetcher,
            lifecycle,
            fetch_attempts,
        }
    }

    /// Process `ingress` on its own tracked task.
    ///
    /// Returns `None` once shutdown has begun.
    pub fn dispatch(self: &Arc<Self>, ingress: Ingress) -> Option<JoinHandle<()>> {
        let router = Arc::clone(self);
        self.lifecycle.spawn_event(async move {
            router.on_event(ingress).await;
        })
    }

    /// Process one notification. Never fails; every error ends up in the
    /// log and, where it is a delivery failure, in the ledger.
    pub async fn on_event(&self, ingress: Ingress) -> RouteDecision {
        let event_id = ingress.event_id().to_string();
        let path = ingress.origin_path().as_str();

        if self.lifecycle.is_shutting_down() {
            debug!(event_id = %event_id, path, "shutting down, event ignored");
            return RouteDecision::ShuttingDown;
        }

        let event = match ingress {
            Ingress::Cached(event) => event,
            Ingress::Raw(raw) => {
                if raw.channel_class == Some(ChannelClass::Other) {
                    debug!(event_id = %event_id, path, "not a target channel");
                    return RouteDecision::WrongChannelClass;
                }

                let cancel = self.lifecycle.cancellation_token();
                match fetch_with_retry(self.fetcher.as_ref(), &raw, self.fetch_attempts, &cancel).await {
                    Ok(Some(event)) => event,
                    Ok(None) => return RouteDecision::FetchSkipped,
                    Err(RouteError::Cancelled) => {
                        debug!(event_id = %event_id, "fetch interrupted by shutdown");
                        return RouteDecision::Cancelled;
                    }
                    Err(e) => {
                        let summary = e.to_string();
                        error!(event_id = %event_id, channel = %raw.channel_id, error = %summary, "could not resolve raw event");
                        self.engine.store().record_failure(FailureRecord::new(
                            event_id,
                            raw.label(),
                            summary.clone(),
                            Utc::now(),
                        ));
                        return RouteDecision::Failed(summary);
                    }
                }
            }
        };

        self.route(event, path).await
    }

    async fn route(&self, event: Event, path: &'static str) -> RouteDecision {
        if event.channel_class != ChannelClass::Target {
            debug!(event_id = %event.event_id, path, "not a target channel");
            return RouteDecision::WrongChannelClass;
        }

        if !event.is_eligible() {
            debug!(event_id = %event.event_id, path, "bot author without webhook origin");
            return RouteDecision::NotEligible;
        }

        if !self.engine.store().try_mark_processed(&event.event_id, Utc::now()) {
            debug!(event_id = %event.event_id, path, "duplicate suppressed");
            return RouteDecision::Duplicate;
        }

        let label = match event.author_name.as_deref() {
            Some(author) => format!("{} ({})", event.label(), author),
            None => event.label(),
        };
        info!(event_id = %event.event_id, channel = %label, path, "publishing announcement");

        let job = DeliveryJob::new(event.event_id.clone(), label, event.message_ref());
        match self.engine.deliver(self.publisher.as_ref(), &job).await {
            Ok(DeliveryOutcome::PermanentlyDenied(reason)) if reason == "forbidden" => {
                // No pre-check is made; the publish call's 403 is the permission signal.
                warn!(
                    event_id = %event.event_id,
                    channel_id = %event.channel_id,
                    "missing permission to publish in channel, needs Send Messages and Manage Messages"
                );
                RouteDecision::Delivered(DeliveryOutcome::PermanentlyDenied(reason))
            }
            Ok(outcome) => RouteDecision::Delivered(outcome),
            Err(EngineError::Cancelled) => {
                warn!(event_id = %event.event_id, "delivery interrupted by shutdown");
                RouteDecision::Cancelled
            }
        }
    }
}
