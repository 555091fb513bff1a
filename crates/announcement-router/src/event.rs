//! Inbound event types.

/// Channel classification. Only `Target` channels are republished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    Target,
    Other,
}

/// Which notification path delivered an event. Not part of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginPath {
    Cached,
    Raw,
}

impl OriginPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginPath::Cached => "cached",
            OriginPath::Raw => "raw",
        }
    }
}

/// A message that can be published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// A fully resolved message notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Platform message id; the dedup key.
    pub event_id: String,
    pub channel_id: String,
    pub channel_class: ChannelClass,
    pub origin_path: OriginPath,
    pub author_is_bot: bool,
    pub has_webhook_origin: bool,
    pub guild_name: Option<String>,
    pub channel_name: Option<String>,
    pub author_name: Option<String>,
}

impl Event {
    /// Eligible when relayed by a webhook, or written by a non-bot.
    pub fn is_eligible(&self) -> bool {
        self.has_webhook_origin || !self.author_is_bot
    }

    /// `guild/#channel`, falling back to ids.
    pub fn label(&self) -> String {
        let guild = self.guild_name.as_deref().unwrap_or("unknown-guild");
        match self.channel_name.as_deref() {
            Some(channel) => format!("{}/#{}", guild, channel),
            None => format!("{}/{}", guild, self.channel_id),
        }
    }

    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id.clone(),
            message_id: self.event_id.clone(),
        }
    }
}

/// Lightweight notification from the raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    /// Known when the channel is cached; otherwise resolved by the fetch.
    pub channel_class: Option<ChannelClass>,
}

impl RawEvent {
    /// Label used before the full event is known.
    pub fn label(&self) -> String {
        match &self.guild_id {
            Some(guild) => format!("{}/{}", guild, self.channel_id),
            None => self.channel_id.clone(),
        }
    }
}

/// A notification from either path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    Cached(Event),
    Raw(RawEvent),
}

impl Ingress {
    pub fn event_id(&self) -> &str {
        match self {
            Ingress::Cached(e) => &e.event_id,
            Ingress::Raw(r) => &r.event_id,
        }
    }

    pub fn origin_path(&self) -> OriginPath {
        match self {
            Ingress::Cached(_) => OriginPath::Cached,
            Ingress::Raw(_) => OriginPath::Raw,
        }
    }
}
