//! Outbound webhook delivery.

use async_trait::async_trait;
use herald_config::StreamerEntry;
use publish_retry_engine::{parse_retry_after, PublishError, Publisher};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const TIMEOUT_SECS: u64 = 30;

/// One webhook post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookMessage {
    pub url: String,
    pub content: String,
}

/// Build the live announcement for a streamer.
pub fn render_live_message(streamer: &StreamerEntry, footer: Option<&str>) -> String {
    let user = &streamer.twitch_username;
    let mut headline = format!("🔴 **{}** is now live on Twitch!", user);
    match (streamer.mention.as_deref(), footer) {
        (Some(mention), _) if !mention.is_empty() => {
            headline.push(' ');
            headline.push_str(mention);
        }
        (_, Some(footer)) if !footer.is_empty() => {
            headline.push_str(" - ");
            headline.push_str(footer);
        }
        _ => {}
    }

    let mut lines = vec![headline, format!("Watch here: https://twitch.tv/{}", user)];
    if let Some(youtube) = streamer
        .youtube
        .as_deref()
        .map(str::trim)
        .filter(|link| link.starts_with("http"))
    {
        lines.push(format!("YouTube Channel: <{}>", youtube));
    }
    lines.join("\n")
}

/// Posts messages to webhooks.
pub struct WebhookPublisher {
    http: Client,
}

impl WebhookPublisher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    type Target = WebhookMessage;

    async fn publish(&self, message: &WebhookMessage) -> Result<(), PublishError> {
        let body = serde_json::json!({ "content": message.content });
        let response = self
            .http
            .post(&message.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "webhook accepted");
            return Ok(());
        }

        let header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        let retry_after = if status.as_u16() == 429 {
            parse_retry_after(&text, header.as_deref())
        } else {
            None
        };
        let detail: String = text.chars().take(200).collect();
        Err(PublishError::from_status(status.as_u16(), retry_after, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streamer() -> StreamerEntry {
        StreamerEntry {
            twitch_username: "alice".to_string(),
            youtube: None,
            webhook_url: None,
            mention: None,
        }
    }

    #[test]
    fn plain_announcement() {
        assert_eq!(
            render_live_message(&streamer(), None),
            "🔴 **alice** is now live on Twitch!\nWatch here: https://twitch.tv/alice"
        );
    }

    #[test]
    fn mention_replaces_footer() {
        let entry = StreamerEntry {
            mention: Some("<@&1234>".to_string()),
            ..streamer()
        };
        let text = render_live_message(&entry, Some("via herald"));
        assert!(text.starts_with("🔴 **alice** is now live on Twitch! <@&1234>\n"));
        assert!(!text.contains("via herald"));

        let text = render_live_message(&streamer(), Some("via herald"));
        assert!(text.starts_with("🔴 **alice** is now live on Twitch! - via herald\n"));
    }

    #[test]
    fn youtube_link_only_when_http() {
        let entry = StreamerEntry {
            youtube: Some("https://youtube.com/@alice".to_string()),
            ..streamer()
        };
        assert!(render_live_message(&entry, None)
            .ends_with("\nYouTube Channel: <https://youtube.com/@alice>"));

        let entry = StreamerEntry {
            youtube: Some("nan".to_string()),
            ..streamer()
        };
        assert!(!render_live_message(&entry, None).contains("YouTube"));
    }
}
