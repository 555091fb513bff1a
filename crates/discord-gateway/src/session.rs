//! Gateway websocket session.

use crate::resolver::build_event;
use crate::{
    intents, ChannelCache, ChannelData, GatewayError, GatewayPayload, GatewayResult, GuildData,
    MessageData, OpCode, ReadyData, UserData,
};
use announcement_router::{Ingress, OriginPath, RawEvent};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default gateway endpoint.
const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Query appended to resume URLs.
const GATEWAY_QUERY: &str = "/?v=10&encoding=json";

/// Gateway session configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway URL for fresh sessions.
    pub url: String,
    /// Intent bits sent with IDENTIFY.
    pub intents: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub reconnect_max_delay_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: GATEWAY_URL.to_string(),
            intents: intents::for_session(false),
            reconnect_base_delay_secs: 1,
            reconnect_max_delay_secs: 60,
        }
    }
}

impl GatewayConfig {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_secs(
            self.reconnect_base_delay_secs
                .saturating_mul(factor)
                .min(self.reconnect_max_delay_secs),
        )
    }
}

/// A chat message, for prefix commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel_id: String,
    pub author_is_bot: bool,
    pub content: String,
}

/// Events emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A fresh session was established.
    Ready { user: UserData, guilds: usize },
    /// A dropped session was resumed.
    Resumed,
    /// A message notification on one of the two paths.
    Ingress(Ingress),
    /// A message with readable content.
    Chat(ChatMessage),
}

/// Why a single connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    Shutdown,
    Reconnect,
}

#[derive(Debug, Default)]
struct ResumeState {
    session_id: Option<String>,
    resume_url: Option<String>,
}

/// Gateway session with automatic reconnection.
pub struct GatewaySession {
    config: GatewayConfig,
    token: String,
    cache: Arc<ChannelCache>,
    events: mpsc::Sender<GatewayEvent>,
    resume: Mutex<ResumeState>,
    seq: Arc<AtomicU64>,
    reconnect_attempts: AtomicU32,
}

impl GatewaySession {
    pub fn new(
        config: GatewayConfig,
        token: &str,
        cache: Arc<ChannelCache>,
        events: mpsc::Sender<GatewayEvent>,
    ) -> Self {
        let token = token.trim();
        Self {
            config,
            token: token.strip_prefix("Bot ").unwrap_or(token).to_string(),
            cache,
            events,
            resume: Mutex::new(ResumeState::default()),
            seq: Arc::new(AtomicU64::new(0)),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Run until `cancel` fires or a fatal error occurs.
    pub async fn run(&self, cancel: &CancellationToken) -> GatewayResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.connect_once(cancel).await {
                Ok(Disconnect::Shutdown) => {
                    info!("gateway session closed for shutdown");
                    return Ok(());
                }
                Ok(Disconnect::Reconnect) => {}
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "gateway session cannot continue");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "gateway connection failed"),
            }

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.config.reconnect_delay(attempt);
            info!(attempt, delay_secs = delay.as_secs(), "scheduling reconnect");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn connect_url(&self) -> String {
        let resume = self.resume.lock();
        match (&resume.session_id, &resume.resume_url) {
            (Some(_), Some(url)) => format!("{}{}", url.trim_end_matches('/'), GATEWAY_QUERY),
            _ => self.config.url.clone(),
        }
    }

    fn last_seq(&self) -> Option<u64> {
        match self.seq.load(Ordering::SeqCst) {
            0 => None,
            s => Some(s),
        }
    }

    fn reset_session(&self) {
        let mut resume = self.resume.lock();
        resume.session_id = None;
        resume.resume_url = None;
        self.seq.store(0, Ordering::SeqCst);
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> GatewayResult<Disconnect> {
        let url = self.connect_url();
        info!(url = %url, "connecting to gateway");

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<Message>(100);
        let mut sender_handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if write.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let acked = Arc::new(AtomicBool::new(true));
        let zombie = Arc::new(Notify::new());
        let mut heartbeat: Option<JoinHandle<()>> = None;

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "shutting down".into(),
                    };
                    let _ = tx.send(Message::Close(Some(frame))).await;
                    break Ok(Disconnect::Shutdown);
                }
                _ = zombie.notified() => {
                    warn!("heartbeat not acknowledged, reconnecting");
                    break Ok(Disconnect::Reconnect);
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match GatewayPayload::from_json(text.as_str()) {
                        Ok(payload) => {
                            match self.handle_payload(payload, cancel, &tx, &acked, &zombie, &mut heartbeat).await {
                                Ok(None) => {}
                                Ok(Some(outcome)) => break Ok(outcome),
                                Err(e) => break Err(e),
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to parse gateway payload"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                            .unwrap_or((1000, String::new()));
                        info!(code, reason = %reason, "gateway closed connection");
                        break self.close_outcome(code, reason);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "websocket error");
                        break Err(e.into());
                    }
                    None => {
                        info!("gateway stream ended");
                        break Ok(Disconnect::Reconnect);
                    }
                }
            }
        };

        // Cleanup
        if let Some(handle) = heartbeat.take() {
            handle.abort();
        }
        drop(tx);
        if tokio::time::timeout(Duration::from_secs(1), &mut sender_handle)
            .await
            .is_err()
        {
            sender_handle.abort();
        }

        result
    }

    /// Forward an event to the consumer.
    ///
    /// Returns false once shutdown has begun or the receiver is gone, so a
    /// full buffer cannot hold the session away from its close frame.
    async fn emit(&self, event: GatewayEvent, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("shutting down, gateway event dropped");
                false
            }
            sent = self.events.send(event) => match sent {
                Ok(()) => true,
                Err(_) => {
                    debug!("gateway event receiver dropped");
                    false
                }
            }
        }
    }

    fn close_outcome(&self, code: u16, reason: String) -> GatewayResult<Disconnect> {
        match code {
            4004 => Err(GatewayError::Unauthorized(reason)),
            4010..=4014 => Err(GatewayError::FatalClose { code, reason }),
            4007 | 4009 => {
                self.reset_session();
                Ok(Disconnect::Reconnect)
            }
            _ => Ok(Disconnect::Reconnect),
        }
    }

    async fn handle_payload(
        &self,
        payload: GatewayPayload,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Message>,
        acked: &Arc<AtomicBool>,
        zombie: &Arc<Notify>,
        heartbeat: &mut Option<JoinHandle<()>>,
    ) -> GatewayResult<Option<Disconnect>> {
        if let Some(s) = payload.s {
            self.seq.store(s, Ordering::SeqCst);
        }

        match payload.opcode() {
            OpCode::Hello => {
                let interval_ms = payload
                    .d
                    .get("heartbeat_interval")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| GatewayError::Protocol("HELLO without heartbeat_interval".to_string()))?;
                debug!(interval_ms, "received HELLO");

                if let Some(old) = heartbeat.replace(spawn_heartbeat(
                    Duration::from_millis(interval_ms),
                    tx.clone(),
                    self.seq.clone(),
                    acked.clone(),
                    zombie.clone(),
                )) {
                    old.abort();
                }

                let session_id = self.resume.lock().session_id.clone();
                let frame = match session_id {
                    Some(session_id) => {
                        info!(session_id = %session_id, "resuming gateway session");
                        GatewayPayload::resume(&self.token, &session_id, self.last_seq())
                    }
                    None => {
                        info!(intents = self.config.intents, "identifying");
                        GatewayPayload::identify(&self.token, self.config.intents)
                    }
                };
                send_frame(tx, &frame).await?;
            }
            OpCode::HeartbeatAck => acked.store(true, Ordering::SeqCst),
            OpCode::Heartbeat => send_frame(tx, &GatewayPayload::heartbeat(self.last_seq())).await?,
            OpCode::Reconnect => {
                info!("gateway requested reconnect");
                return Ok(Some(Disconnect::Reconnect));
            }
            OpCode::InvalidSession => {
                let resumable = payload.d.as_bool().unwrap_or(false);
                warn!(resumable, "gateway invalidated session");
                if !resumable {
                    self.reset_session();
                }
                return Ok(Some(Disconnect::Reconnect));
            }
            OpCode::Dispatch => {
                let event_type = payload.t.as_deref().unwrap_or_default();
                for event in self.handle_dispatch(event_type, payload.d) {
                    if !self.emit(event, cancel).await {
                        break;
                    }
                }
            }
            other => debug!(op = other.code(), "ignoring gateway opcode"),
        }

        Ok(None)
    }

    /// Apply a dispatch to the cache and return the events it produces.
    fn handle_dispatch(&self, event_type: &str, data: serde_json::Value) -> Vec<GatewayEvent> {
        match event_type {
            "READY" => match serde_json::from_value::<ReadyData>(data) {
                Ok(ready) => {
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                    {
                        let mut resume = self.resume.lock();
                        resume.session_id = Some(ready.session_id.clone());
                        resume.resume_url = ready.resume_gateway_url.clone();
                    }
                    self.cache.clear();
                    for guild in &ready.guilds {
                        if let Some(id) = guild.get("id").and_then(|v| v.as_str()) {
                            self.cache.note_guild(id);
                        }
                    }
                    info!(user = %ready.user.username, guilds = ready.guilds.len(), "gateway ready");
                    vec![GatewayEvent::Ready {
                        guilds: ready.guilds.len(),
                        user: ready.user,
                    }]
                }
                Err(e) => {
                    warn!(error = %e, "malformed READY");
                    Vec::new()
                }
            },
            "RESUMED" => {
                self.reconnect_attempts.store(0, Ordering::SeqCst);
                info!("gateway session resumed");
                vec![GatewayEvent::Resumed]
            }
            "GUILD_CREATE" => {
                match serde_json::from_value::<GuildData>(data) {
                    Ok(guild) if guild.unavailable == Some(true) => self.cache.note_guild(&guild.id),
                    Ok(guild) => {
                        debug!(guild = %guild.id, channels = guild.channels.len(), "guild available");
                        self.cache.upsert_guild(&guild);
                    }
                    Err(e) => warn!(error = %e, "malformed GUILD_CREATE"),
                }
                Vec::new()
            }
            "GUILD_DELETE" => {
                let unavailable = data.get("unavailable").and_then(|v| v.as_bool()).unwrap_or(false);
                if let (Some(id), false) = (data.get("id").and_then(|v| v.as_str()), unavailable) {
                    info!(guild = %id, "removed from guild");
                    self.cache.remove_guild(id);
                }
                Vec::new()
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => {
                match serde_json::from_value::<ChannelData>(data) {
                    Ok(channel) => self.cache.upsert_channel(&channel),
                    Err(e) => warn!(error = %e, event = event_type, "malformed channel payload"),
                }
                Vec::new()
            }
            "CHANNEL_DELETE" => {
                if let Some(id) = data.get("id").and_then(|v| v.as_str()) {
                    self.cache.remove_channel(id);
                }
                Vec::new()
            }
            "MESSAGE_CREATE" => match serde_json::from_value::<MessageData>(data) {
                Ok(message) => self.message_events(message),
                Err(e) => {
                    warn!(error = %e, "malformed MESSAGE_CREATE");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        }
    }

    /// Both notification paths for one message, cached first.
    fn message_events(&self, message: MessageData) -> Vec<GatewayEvent> {
        let channel = self.cache.channel(&message.channel_id);
        let mut events = Vec::with_capacity(3);

        if let Some(channel) = &channel {
            events.push(GatewayEvent::Ingress(Ingress::Cached(build_event(
                &message,
                Some(channel),
                channel.class(),
                &self.cache,
                OriginPath::Cached,
            ))));
        }

        events.push(GatewayEvent::Ingress(Ingress::Raw(RawEvent {
            event_id: message.id.clone(),
            channel_id: message.channel_id.clone(),
            guild_id: message.guild_id.clone(),
            channel_class: channel.as_ref().map(|c| c.class()),
        })));

        if !message.content.is_empty() {
            events.push(GatewayEvent::Chat(ChatMessage {
                channel_id: message.channel_id.clone(),
                author_is_bot: message.author_is_bot(),
                content: message.content,
            }));
        }

        events
    }
}

async fn send_frame(tx: &mpsc::Sender<Message>, frame: &GatewayPayload) -> GatewayResult<()> {
    let json = frame.to_json()?;
    tx.send(Message::Text(json.into()))
        .await
        .map_err(|_| GatewayError::Protocol("gateway writer closed".to_string()))
}

fn spawn_heartbeat(
    every: Duration,
    tx: mpsc::Sender<Message>,
    seq: Arc<AtomicU64>,
    acked: Arc<AtomicBool>,
    zombie: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if !acked.swap(false, Ordering::SeqCst) {
                zombie.notify_one();
                break;
            }
            let last = match seq.load(Ordering::SeqCst) {
                0 => None,
                s => Some(s),
            };
            if send_frame(&tx, &GatewayPayload::heartbeat(last)).await.is_err() {
                break;
            }
        }
    })
}
