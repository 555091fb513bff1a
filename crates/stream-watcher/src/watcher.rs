//! Live-transition polling loop.

use crate::{render_live_message, LiveStream, StreamSource, WebhookMessage};
use chrono::Utc;
use herald_config::{StreamWatcherConfig, StreamerEntry};
use herald_lifecycle::LifecycleCoordinator;
use publish_retry_engine::{DeliveryJob, EngineError, Publisher, RetryEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A change in a streamer's live status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    WentLive { username: String, stream_id: String },
    WentOffline { username: String },
}

/// Result of one pass over the configured streamers.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub transitions: Vec<Transition>,
    /// Announcement tasks started by this pass.
    pub deliveries: Vec<JoinHandle<()>>,
}

impl PollOutcome {
    /// Wait for this pass's announcements to reach a terminal state.
    pub async fn join(self) -> Vec<Transition> {
        for handle in self.deliveries {
            if let Err(e) = handle.await {
                warn!(error = %e, "announcement task failed");
            }
        }
        self.transitions
    }
}

/// Polls each configured streamer and announces new broadcasts.
///
/// Each announcement runs on its own lifecycle event task, so a streamer
/// whose webhook is rate limited never holds up the others.
pub struct StreamWatcher<S: ?Sized, P> {
    source: Arc<S>,
    publisher: Arc<P>,
    engine: RetryEngine,
    lifecycle: LifecycleCoordinator,
    config: StreamWatcherConfig,
    /// Current stream id per live streamer.
    live: HashMap<String, String>,
}

impl<S, P> StreamWatcher<S, P>
where
    S: StreamSource + ?Sized,
    P: Publisher<Target = WebhookMessage> + 'static,
{
    pub fn new(
        source: Arc<S>,
        publisher: Arc<P>,
        engine: RetryEngine,
        lifecycle: LifecycleCoordinator,
        config: StreamWatcherConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            engine,
            lifecycle,
            config,
            live: HashMap::new(),
        }
    }

    pub fn is_live(&self, username: &str) -> bool {
        self.live.contains_key(username)
    }

    /// Check every streamer once.
    ///
    /// A failed status check leaves that streamer's state unchanged.
    /// Announcements are started, not awaited; see [`PollOutcome::join`].
    pub async fn poll_once(&mut self) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        for streamer in &self.config.streamers {
            let username = streamer.twitch_username.as_str();
            let current = match self.source.live_stream(username).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(streamer = %username, error = %e, "live status check failed");
                    continue;
                }
            };

            let previous = self.live.get(username).cloned();
            match (current, previous) {
                (Some(stream), previous) if previous.as_ref() != Some(&stream.id) => {
                    info!(streamer = %username, stream_id = %stream.id, "went live");
                    self.live.insert(username.to_string(), stream.id.clone());
                    if let Some(handle) = self.announce(streamer, &stream) {
                        outcome.deliveries.push(handle);
                    }
                    outcome.transitions.push(Transition::WentLive {
                        username: username.to_string(),
                        stream_id: stream.id,
                    });
                }
                (None, Some(_)) => {
                    info!(streamer = %username, "went offline");
                    self.live.remove(username);
                    outcome.transitions.push(Transition::WentOffline {
                        username: username.to_string(),
                    });
                }
                _ => {}
            }
        }

        outcome
    }

    /// Start delivering the live announcement for `stream`.
    fn announce(&self, streamer: &StreamerEntry, stream: &LiveStream) -> Option<JoinHandle<()>> {
        let username = &streamer.twitch_username;
        let Some(url) = self.config.webhook_for(streamer) else {
            warn!(streamer = %username, "no webhook configured, announcement skipped");
            return None;
        };

        let job = DeliveryJob::new(
            format!("twitch:{}", stream.id),
            format!("twitch/{}", username),
            WebhookMessage {
                url: url.to_string(),
                content: render_live_message(streamer, self.config.footer.as_deref()),
            },
        );
        let engine = self.engine.clone();
        let publisher = Arc::clone(&self.publisher);

        let handle = self.lifecycle.spawn_event(async move {
            deliver_announcement(&engine, publisher.as_ref(), &job).await;
        });
        if handle.is_none() {
            debug!(streamer = %username, "shutting down, announcement skipped");
        }
        handle
    }

    /// Poll until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let interval = self.config.check_interval();
        info!(
            streamers = self.config.streamers.len(),
            interval_secs = interval.as_secs(),
            "stream watcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        debug!("stream watcher stopped");
    }
}

async fn deliver_announcement<P>(
    engine: &RetryEngine,
    publisher: &P,
    job: &DeliveryJob<WebhookMessage>,
) where
    P: Publisher<Target = WebhookMessage> + ?Sized,
{
    if !engine.store().try_mark_processed(&job.event_id, Utc::now()) {
        debug!(event_id = %job.event_id, "broadcast already announced");
        return;
    }

    match engine.deliver(publisher, job).await {
        Ok(outcome) if outcome.is_success() => {}
        Ok(outcome) => error!(
            event_id = %job.event_id,
            outcome = outcome.as_str(),
            "live announcement not delivered"
        ),
        Err(EngineError::Cancelled) => {
            warn!(event_id = %job.event_id, "shutdown interrupted live announcement");
        }
    }
}

/// Register the watcher as a lifecycle background task.
pub fn spawn_stream_watcher<S, P>(lifecycle: &LifecycleCoordinator, watcher: StreamWatcher<S, P>)
where
    S: StreamSource + ?Sized + 'static,
    P: Publisher<Target = WebhookMessage> + 'static,
{
    let cancel = lifecycle.cancellation_token();
    lifecycle.spawn_background("stream-watcher", watcher.run(cancel));
}
