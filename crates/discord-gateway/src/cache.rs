//! Guild and channel cache fed by gateway dispatches.

use crate::{ChannelData, GuildData};
use announcement_router::ChannelClass;
use parking_lot::RwLock;
use status_reporter::PlatformDirectory;
use std::collections::HashMap;

/// Channel kind of announcement (news) channels.
pub const ANNOUNCEMENT_CHANNEL: u8 = 5;

/// A cached channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedChannel {
    pub id: String,
    pub guild_id: Option<String>,
    pub name: Option<String>,
    pub kind: u8,
}

impl CachedChannel {
    pub fn class(&self) -> ChannelClass {
        if self.kind == ANNOUNCEMENT_CHANNEL {
            ChannelClass::Target
        } else {
            ChannelClass::Other
        }
    }
}

impl From<&ChannelData> for CachedChannel {
    fn from(data: &ChannelData) -> Self {
        Self {
            id: data.id.clone(),
            guild_id: data.guild_id.clone(),
            name: data.name.clone(),
            kind: data.kind,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    guilds: HashMap<String, Option<String>>,
    channels: HashMap<String, CachedChannel>,
}

/// Thread-safe cache of guilds and channels.
#[derive(Debug, Default)]
pub struct ChannelCache {
    inner: RwLock<Inner>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a guild and all of its channels.
    pub fn upsert_guild(&self, guild: &GuildData) {
        let mut inner = self.inner.write();
        inner.guilds.insert(guild.id.clone(), guild.name.clone());
        for channel in &guild.channels {
            let mut cached = CachedChannel::from(channel);
            // Channels nested in GUILD_CREATE omit guild_id.
            cached.guild_id.get_or_insert_with(|| guild.id.clone());
            inner.channels.insert(cached.id.clone(), cached);
        }
    }

    /// Mark a guild known without details (READY lists ids only).
    pub fn note_guild(&self, guild_id: &str) {
        self.inner
            .write()
            .guilds
            .entry(guild_id.to_string())
            .or_insert(None);
    }

    pub fn remove_guild(&self, guild_id: &str) {
        let mut inner = self.inner.write();
        inner.guilds.remove(guild_id);
        inner
            .channels
            .retain(|_, channel| channel.guild_id.as_deref() != Some(guild_id));
    }

    pub fn upsert_channel(&self, channel: &ChannelData) {
        self.inner
            .write()
            .channels
            .insert(channel.id.clone(), CachedChannel::from(channel));
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.inner.write().channels.remove(channel_id);
    }

    pub fn channel(&self, channel_id: &str) -> Option<CachedChannel> {
        self.inner.read().channels.get(channel_id).cloned()
    }

    pub fn class_of(&self, channel_id: &str) -> Option<ChannelClass> {
        self.inner.read().channels.get(channel_id).map(|c| c.class())
    }

    pub fn guild_name(&self, guild_id: &str) -> Option<String> {
        self.inner.read().guilds.get(guild_id).cloned().flatten()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.guilds.clear();
        inner.channels.clear();
    }
}

impl PlatformDirectory for ChannelCache {
    fn guild_count(&self) -> usize {
        self.inner.read().guilds.len()
    }

    fn target_channel_count(&self) -> usize {
        self.inner
            .read()
            .channels
            .values()
            .filter(|c| c.kind == ANNOUNCEMENT_CHANNEL)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, kind: u8) -> ChannelData {
        ChannelData {
            id: id.to_string(),
            kind,
            name: Some(format!("chan-{}", id)),
            guild_id: None,
        }
    }

    fn guild() -> GuildData {
        GuildData {
            id: "g1".to_string(),
            name: Some("Herald Guild".to_string()),
            channels: vec![channel("10", 0), channel("11", ANNOUNCEMENT_CHANNEL)],
            unavailable: None,
        }
    }

    #[test]
    fn guild_create_fills_channels() {
        let cache = ChannelCache::new();
        cache.upsert_guild(&guild());

        assert_eq!(cache.guild_count(), 1);
        assert_eq!(cache.target_channel_count(), 1);
        assert_eq!(cache.class_of("11"), Some(ChannelClass::Target));
        assert_eq!(cache.class_of("10"), Some(ChannelClass::Other));
        assert_eq!(cache.class_of("99"), None);
        assert_eq!(cache.channel("11").unwrap().guild_id.as_deref(), Some("g1"));
        assert_eq!(cache.guild_name("g1").as_deref(), Some("Herald Guild"));
    }

    #[test]
    fn channel_update_changes_class() {
        let cache = ChannelCache::new();
        cache.upsert_guild(&guild());
        cache.upsert_channel(&ChannelData {
            guild_id: Some("g1".to_string()),
            ..channel("10", ANNOUNCEMENT_CHANNEL)
        });
        assert_eq!(cache.target_channel_count(), 2);

        cache.remove_channel("11");
        assert_eq!(cache.target_channel_count(), 1);
    }

    #[test]
    fn guild_delete_drops_its_channels() {
        let cache = ChannelCache::new();
        cache.upsert_guild(&guild());
        cache.remove_guild("g1");
        assert_eq!(cache.guild_count(), 0);
        assert_eq!(cache.target_channel_count(), 0);
    }

    #[test]
    fn note_guild_does_not_clobber_name() {
        let cache = ChannelCache::new();
        cache.upsert_guild(&guild());
        cache.note_guild("g1");
        cache.note_guild("g2");
        assert_eq!(cache.guild_name("g1").as_deref(), Some("Herald Guild"));
        assert_eq!(cache.guild_count(), 2);
    }
}
