//! Configuration management.
//!
//! Values come from three layers, later layers winning: built-in defaults,
//! `~/.herald/config.json`, then environment variables (a `.env` file in the
//! working directory is loaded into the environment first).

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default chat command prefix.
pub const DEFAULT_PREFIX: &str = "!";

const TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Retry, retention and shutdown tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTuning {
    /// Delivery attempts per event (rate-limit waits included).
    pub max_retries: u32,
    /// Maximum age of ledger and dedup entries.
    pub retention_window_secs: u64,
    /// Period of the eviction sweep.
    pub eviction_interval_secs: u64,
    /// Wait used when a rate-limit response carries no retry-after.
    pub default_rate_limit_secs: u64,
    /// Upper bound for exponential backoff.
    pub backoff_cap_secs: u64,
    /// Attempts when resolving a raw event into a full event.
    pub fetch_attempts: u32,
    /// How long shutdown waits for tasks before aborting them.
    pub shutdown_grace_secs: u64,
}

impl Default for RetryTuning {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retention_window_secs: 24 * 60 * 60,
            eviction_interval_secs: 60 * 60,
            default_rate_limit_secs: 60,
            backoff_cap_secs: 60,
            fetch_attempts: 3,
            shutdown_grace_secs: 5,
        }
    }
}

impl RetryTuning {
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn default_rate_limit(&self) -> Duration {
        Duration::from_secs(self.default_rate_limit_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// One watched streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerEntry {
    /// Login name on the streaming platform.
    pub twitch_username: String,
    /// Optional YouTube channel link appended to the announcement.
    #[serde(default)]
    pub youtube: Option<String>,
    /// Per-streamer webhook; overrides the default webhook.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Optional mention (e.g. `<@&123>`) appended to the headline.
    #[serde(default)]
    pub mention: Option<String>,
}

/// Streaming-platform watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamWatcherConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    /// Webhook used for streamers without an override.
    #[serde(default)]
    pub default_webhook_url: Option<String>,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Text appended to the headline of announcements without a mention.
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub streamers: Vec<StreamerEntry>,
}

fn default_check_interval_secs() -> u64 {
    60
}

impl Default for StreamWatcherConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            default_webhook_url: None,
            check_interval_secs: default_check_interval_secs(),
            footer: None,
            streamers: Vec::new(),
        }
    }
}

impl StreamWatcherConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Webhook for a streamer: its override, else the default.
    pub fn webhook_for<'a>(&'a self, streamer: &'a StreamerEntry) -> Option<&'a str> {
        streamer
            .webhook_url
            .as_deref()
            .or(self.default_webhook_url.as_deref())
    }
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot credential. Never written back to disk.
    #[serde(skip_serializing)]
    pub discord_token: Option<String>,
    /// Prefix for chat commands (`!status`).
    pub command_prefix: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Request elevated read access to message content.
    pub message_content_intent: bool,
    pub retry: RetryTuning,
    pub stream_watcher: Option<StreamWatcherConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: None,
            command_prefix: DEFAULT_PREFIX.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            message_content_intent: false,
            retry: RetryTuning::default(),
            stream_watcher: None,
        }
    }
}

impl Config {
    /// Load configuration: `.env`, then the config file (if present), then
    /// the process environment.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let _ = dotenvy::dotenv();

        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration (without secrets) to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = non_empty(TOKEN_ENV) {
            self.discord_token = Some(token);
        }
        if let Some(prefix) = non_empty("BOT_PREFIX") {
            self.command_prefix = prefix;
        }
        if let Some(level) = non_empty("HERALD_LOG_LEVEL").or_else(|| non_empty("LOG_LEVEL")) {
            self.log_level = level.to_ascii_lowercase();
        }
        if let Some(flag) = non_empty("HERALD_MESSAGE_CONTENT") {
            self.message_content_intent = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = non_empty("HERALD_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.retry.max_retries = v;
        }
        if let Some(v) = non_empty("HERALD_RETENTION_SECS").and_then(|v| v.parse().ok()) {
            self.retry.retention_window_secs = v;
        }
        if let Some(v) = non_empty("HERALD_EVICTION_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.retry.eviction_interval_secs = v;
        }

        let client_id = non_empty("TWITCH_CLIENT_ID");
        if client_id.is_some() || self.stream_watcher.is_some() {
            let watcher = self.stream_watcher.get_or_insert_with(StreamWatcherConfig::default);
            if let Some(id) = client_id {
                watcher.client_id = id;
            }
            if let Some(secret) = non_empty("TWITCH_CLIENT_SECRET") {
                watcher.client_secret = secret;
            }
            if let Some(url) = non_empty("DISCORD_WEBHOOK_URL") {
                watcher.default_webhook_url = Some(url);
            }
        }
    }

    /// The validated bot token.
    pub fn token(&self) -> CoreResult<&str> {
        let token = self
            .discord_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CoreError::MissingCredential(TOKEN_ENV))?;
        validate_token(token)?;
        Ok(token)
    }

    /// Validate the whole configuration, including the credential.
    pub fn validate(&self) -> CoreResult<()> {
        self.token()?;

        if self.command_prefix.is_empty() {
            return Err(CoreError::Config("command_prefix must not be empty".to_string()));
        }
        if self.retry.max_retries == 0 {
            return Err(CoreError::Config("retry.max_retries must be at least 1".to_string()));
        }
        if self.retry.fetch_attempts == 0 {
            return Err(CoreError::Config("retry.fetch_attempts must be at least 1".to_string()));
        }
        if self.retry.eviction_interval_secs == 0 || self.retry.retention_window_secs == 0 {
            return Err(CoreError::Config(
                "retention window and eviction interval must be positive".to_string(),
            ));
        }

        if let Some(watcher) = &self.stream_watcher {
            if watcher.client_id.is_empty() || watcher.client_secret.is_empty() {
                return Err(CoreError::Config(
                    "stream_watcher requires TWITCH_CLIENT_ID and TWITCH_CLIENT_SECRET".to_string(),
                ));
            }
            if watcher.check_interval_secs == 0 {
                return Err(CoreError::Config(
                    "stream_watcher.check_interval_secs must be positive".to_string(),
                ));
            }
            for streamer in &watcher.streamers {
                let hook = watcher.webhook_for(streamer).ok_or_else(|| {
                    CoreError::Config(format!(
                        "no webhook configured for streamer {}",
                        streamer.twitch_username
                    ))
                })?;
                Url::parse(hook)?;
            }
        }

        Ok(())
    }

    /// Token with everything but the first few characters masked.
    pub fn redacted_token(&self) -> String {
        match self.discord_token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => {
                let visible: String = t.chars().take(4).collect();
                format!("{}…", visible)
            }
            _ => "<unset>".to_string(),
        }
    }
}

/// Check that a credential has the shape of a bot token.
///
/// Accepts an optional `Bot ` prefix; the remainder must be three non-empty
/// dot-separated segments of URL-safe base64 characters.
pub fn validate_token(token: &str) -> CoreResult<()> {
    let token = token.trim();
    let token = token.strip_prefix("Bot ").unwrap_or(token);
    if token.is_empty() {
        return Err(CoreError::MissingCredential(TOKEN_ENV));
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(CoreError::MalformedCredential(
            "expected three dot-separated segments".to_string(),
        ));
    }

    let valid_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !segments.iter().all(|s| s.chars().all(valid_char)) {
        return Err(CoreError::MalformedCredential(
            "token contains invalid characters".to_string(),
        ));
    }

    Ok(())
}
