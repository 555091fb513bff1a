//! Raw notification resolution backed by the REST client and the cache.

use crate::{CachedChannel, ChannelCache, MessageData, RestClient};
use announcement_router::{ChannelClass, Event, EventFetcher, FetchError, OriginPath, RawEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Build a routing event from a message and what is known about its channel.
pub(crate) fn build_event(
    message: &MessageData,
    channel: Option<&CachedChannel>,
    class: ChannelClass,
    cache: &ChannelCache,
    origin_path: OriginPath,
) -> Event {
    let guild_id = message
        .guild_id
        .clone()
        .or_else(|| channel.and_then(|c| c.guild_id.clone()));

    Event {
        event_id: message.id.clone(),
        channel_id: message.channel_id.clone(),
        channel_class: class,
        origin_path,
        author_is_bot: message.author_is_bot(),
        has_webhook_origin: message.webhook_id.is_some(),
        guild_name: guild_id.as_deref().and_then(|g| cache.guild_name(g)),
        channel_name: channel.and_then(|c| c.name.clone()),
        author_name: Some(message.author.username.clone()),
    }
}

/// Resolves raw notifications by fetching the message (and, for uncached
/// channels, the channel).
pub struct MessageResolver {
    rest: Arc<RestClient>,
    cache: Arc<ChannelCache>,
}

impl MessageResolver {
    pub fn new(rest: Arc<RestClient>, cache: Arc<ChannelCache>) -> Self {
        Self { rest, cache }
    }

    async fn channel(&self, channel_id: &str) -> Result<CachedChannel, FetchError> {
        if let Some(channel) = self.cache.channel(channel_id) {
            return Ok(channel);
        }
        debug!(channel = %channel_id, "channel not cached, fetching");
        let data = self.rest.fetch_channel(channel_id).await?;
        self.cache.upsert_channel(&data);
        Ok(CachedChannel::from(&data))
    }
}

#[async_trait]
impl EventFetcher for MessageResolver {
    async fn fetch_event(&self, raw: &RawEvent) -> Result<Event, FetchError> {
        let message = self.rest.fetch_message(&raw.channel_id, &raw.event_id).await?;
        let channel = self.channel(&raw.channel_id).await?;
        let class = raw.channel_class.unwrap_or_else(|| channel.class());
        Ok(build_event(
            &message,
            Some(&channel),
            class,
            &self.cache,
            OriginPath::Raw,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GuildData, UserData, ANNOUNCEMENT_CHANNEL};

    fn message(bot: bool, webhook: bool) -> MessageData {
        MessageData {
            id: "500".to_string(),
            channel_id: "11".to_string(),
            guild_id: None,
            author: UserData {
                id: "9".to_string(),
                username: "alice".to_string(),
                bot: Some(bot),
            },
            webhook_id: webhook.then(|| "77".to_string()),
            content: String::new(),
        }
    }

    #[test]
    fn build_event_uses_cached_names() {
        let cache = ChannelCache::new();
        cache.upsert_guild(&GuildData {
            id: "g1".to_string(),
            name: Some("Herald Guild".to_string()),
            channels: vec![crate::ChannelData {
                id: "11".to_string(),
                kind: ANNOUNCEMENT_CHANNEL,
                name: Some("news".to_string()),
                guild_id: None,
            }],
            unavailable: None,
        });
        let channel = cache.channel("11").unwrap();

        let event = build_event(
            &message(true, true),
            Some(&channel),
            channel.class(),
            &cache,
            OriginPath::Cached,
        );
        assert_eq!(event.event_id, "500");
        assert_eq!(event.channel_class, ChannelClass::Target);
        assert!(event.author_is_bot);
        assert!(event.has_webhook_origin);
        assert_eq!(event.label(), "Herald Guild/#news");
    }
}
