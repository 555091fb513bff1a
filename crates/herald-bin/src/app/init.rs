//! Herald startup, event loop and shutdown.

use super::commands::{parse_command, Command};
use super::error::{AppError, AppResult};
use announcement_router::Router;
use chrono::Utc;
use delivery_ledger::DeliveryStore;
use discord_gateway::{
    intents, ChannelCache, ChatMessage, GatewayConfig, GatewayEvent, GatewaySession,
    MessageResolver, RestClient,
};
use herald_config::{Config, StreamWatcherConfig};
use herald_lifecycle::{
    install_signal_handler, spawn_eviction_task, EvictionSchedule, LifecycleCoordinator,
};
use publish_retry_engine::{RetryEngine, RetryPolicy};
use status_reporter::StatusReporter;
use std::sync::Arc;
use stream_watcher::{spawn_stream_watcher, HelixClient, StreamWatcher, WatcherError, WebhookPublisher};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Gateway event buffer.
const EVENT_BUFFER: usize = 256;

/// Run herald until a termination signal or a fatal gateway error.
pub async fn run_herald(config: Config) -> AppResult<()> {
    config.validate()?;
    let token = config.token()?.to_string();

    info!(
        token = %config.redacted_token(),
        prefix = %config.command_prefix,
        message_content = config.message_content_intent,
        max_retries = config.retry.max_retries,
        "Starting herald"
    );

    // Credential check before anything is spawned
    let rest = Arc::new(RestClient::new(&token)?);
    let me = rest.current_user().await?;
    info!(user = %me.username, user_id = %me.id, "Credential accepted");

    let lifecycle = LifecycleCoordinator::new(config.retry.shutdown_grace());
    let cancel = lifecycle.cancellation_token();

    let store = DeliveryStore::new();
    let policy = RetryPolicy {
        max_retries: config.retry.max_retries,
        backoff_cap: config.retry.backoff_cap(),
        default_rate_limit: config.retry.default_rate_limit(),
    };
    let engine = RetryEngine::new(store.clone(), policy, cancel.clone());

    let cache = Arc::new(ChannelCache::new());
    let resolver = Arc::new(MessageResolver::new(rest.clone(), cache.clone()));
    let router = Arc::new(Router::new(
        engine.clone(),
        rest.clone(),
        resolver,
        lifecycle.clone(),
        config.retry.fetch_attempts,
    ));
    let reporter = Arc::new(StatusReporter::new(store.clone(), cache.clone(), Utc::now()));

    spawn_eviction_task(
        &lifecycle,
        store.clone(),
        EvictionSchedule {
            retention: config.retry.retention_window(),
            interval: config.retry.eviction_interval(),
        },
    );
    install_signal_handler(&lifecycle);

    if let Some(watcher_config) = &config.stream_watcher {
        start_stream_watcher(&lifecycle, engine.clone(), watcher_config)?;
    }

    {
        let rest = rest.clone();
        lifecycle.on_teardown("rest-client", move || async move {
            rest.close();
        });
    }

    // Gateway session
    let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
    let (result_tx, result_rx) = oneshot::channel();
    let session = GatewaySession::new(
        GatewayConfig {
            intents: intents::for_session(config.message_content_intent),
            ..Default::default()
        },
        &token,
        cache.clone(),
        events_tx,
    );
    {
        let cancel = cancel.clone();
        lifecycle.spawn_background("gateway", async move {
            let result = session.run(&cancel).await;
            let _ = result_tx.send(result);
        });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(GatewayEvent::Ready { user, guilds }) => {
                    info!(user = %user.username, guilds, "Herald ready");
                    lifecycle.mark_ready();
                }
                Some(GatewayEvent::Resumed) => debug!("gateway resumed"),
                Some(GatewayEvent::Ingress(ingress)) => {
                    if router.dispatch(ingress).is_none() {
                        debug!("event dropped during shutdown");
                    }
                }
                Some(GatewayEvent::Chat(chat)) => {
                    handle_chat(&lifecycle, &config.command_prefix, &rest, &reporter, chat);
                }
                None => {
                    warn!("gateway session ended");
                    break;
                }
            }
        }
    }

    // Nothing reads events past this point; a blocked gateway send must fail.
    drop(events);
    lifecycle.request_shutdown();
    lifecycle.await_shutdown_complete().await;
    info!(summary = %reporter.summary(Utc::now()).render(), "Final status");

    match result_rx.await {
        Ok(Err(e)) => Err(AppError::Gateway(e)),
        _ => {
            info!(uptime_secs = lifecycle.uptime().as_secs(), "Herald stopped");
            Ok(())
        }
    }
}

fn start_stream_watcher(
    lifecycle: &LifecycleCoordinator,
    engine: RetryEngine,
    config: &StreamWatcherConfig,
) -> AppResult<()> {
    if config.streamers.is_empty() {
        info!("stream watcher configured without streamers, not started");
        return Ok(());
    }

    let source = Arc::new(HelixClient::new(&config.client_id, &config.client_secret)?);
    let publisher = Arc::new(WebhookPublisher::new().map_err(WatcherError::from)?);
    let watcher = StreamWatcher::new(
        source,
        publisher,
        engine,
        lifecycle.clone(),
        config.clone(),
    );
    spawn_stream_watcher(lifecycle, watcher);
    Ok(())
}

fn handle_chat(
    lifecycle: &LifecycleCoordinator,
    prefix: &str,
    rest: &Arc<RestClient>,
    reporter: &Arc<StatusReporter>,
    chat: ChatMessage,
) {
    if let Some(Command::Status) = parse_command(prefix, &chat) {
        let rest = rest.clone();
        let reporter = reporter.clone();
        lifecycle.spawn_event(async move {
            let text = reporter.summary(Utc::now()).render();
            match rest.create_message(&chat.channel_id, &text).await {
                Ok(()) => debug!(channel = %chat.channel_id, "status reply sent"),
                Err(e) => error!(channel = %chat.channel_id, error = %e, "status reply failed"),
            }
        });
    }
}
