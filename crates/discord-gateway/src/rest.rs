//! REST client for the chat platform API.

use crate::{ChannelData, GatewayError, GatewayResult, MessageData, UserData};
use announcement_router::{FetchError, MessageRef};
use async_trait::async_trait;
use parking_lot::RwLock;
use publish_retry_engine::{parse_retry_after, PublishError, Publisher};
use reqwest::{Client, Method};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// API base URL.
pub const API_BASE: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/herald-bot/herald, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Error code returned when a message was already crossposted.
const ALREADY_CROSSPOSTED: u64 = 40033;

/// Request timeout.
const TIMEOUT_SECS: u64 = 30;

/// A failed API call, before it is mapped to a caller's error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestFailure {
    /// The server answered with a non-success status.
    Status {
        status: u16,
        retry_after: Option<Duration>,
        code: Option<u64>,
        message: String,
    },
    /// No response (connect, timeout, decode).
    Transport(String),
    /// The client was closed during shutdown.
    Closed,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u64>,
}

impl RestFailure {
    /// Build from a status line, a `Retry-After` header and the body.
    pub fn from_response(status: u16, retry_after_header: Option<&str>, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| body.chars().take(200).collect());
        RestFailure::Status {
            status,
            retry_after: if status == 429 {
                parse_retry_after(body, retry_after_header)
            } else {
                None
            },
            code: parsed.and_then(|b| b.code),
            message,
        }
    }
}

impl From<RestFailure> for PublishError {
    fn from(failure: RestFailure) -> Self {
        match failure {
            RestFailure::Status {
                status,
                retry_after,
                message,
                ..
            } => PublishError::from_status(status, retry_after, message),
            RestFailure::Transport(e) => PublishError::Transient(e),
            RestFailure::Closed => PublishError::Transient("client closed".to_string()),
        }
    }
}

impl From<RestFailure> for FetchError {
    fn from(failure: RestFailure) -> Self {
        match failure {
            RestFailure::Status {
                status: 404,
                message,
                ..
            } => FetchError::NotFound(message),
            RestFailure::Status {
                status: 401 | 403,
                message,
                ..
            } => FetchError::Forbidden(message),
            RestFailure::Status {
                status, message, ..
            } => FetchError::Transient(format!("HTTP {}: {}", status, message)),
            RestFailure::Transport(e) => FetchError::Transient(e),
            RestFailure::Closed => FetchError::Transient("client closed".to_string()),
        }
    }
}

impl From<RestFailure> for GatewayError {
    fn from(failure: RestFailure) -> Self {
        match failure {
            RestFailure::Status {
                status: 401,
                message,
                ..
            } => GatewayError::Unauthorized(message),
            RestFailure::Status {
                status, message, ..
            } => GatewayError::Api { status, message },
            RestFailure::Transport(e) => GatewayError::Protocol(e),
            RestFailure::Closed => GatewayError::Closed,
        }
    }
}

/// REST client. The underlying connection pool is dropped by [`close`](Self::close).
pub struct RestClient {
    http: RwLock<Option<Client>>,
    base_url: String,
    auth: String,
}

impl RestClient {
    /// Create a client against the production API.
    pub fn new(token: &str) -> GatewayResult<Self> {
        Self::with_base_url(token, API_BASE)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(token: &str, base_url: &str) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        let token = token.trim();
        let token = token.strip_prefix("Bot ").unwrap_or(token);

        Ok(Self {
            http: RwLock::new(Some(http)),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: format!("Bot {}", token),
        })
    }

    /// Release the connection pool. Later calls fail with a transient error.
    pub fn close(&self) {
        if self.http.write().take().is_some() {
            debug!("REST client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.http.read().is_none()
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, RestFailure> {
        let http = self.http.read().clone().ok_or(RestFailure::Closed)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = http
            .request(method.clone(), &url)
            .header("Authorization", &self.auth);
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(method = %method, path = %path, "API request");
        let response = request
            .send()
            .await
            .map_err(|e| RestFailure::Transport(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| RestFailure::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(RestFailure::from_response(
                status.as_u16(),
                retry_after.as_deref(),
                &text,
            ))
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, RestFailure> {
        serde_json::from_str(text).map_err(|e| RestFailure::Transport(format!("decode: {}", e)))
    }

    /// Crosspost a message from an announcement channel to its followers.
    pub async fn publish(&self, channel_id: &str, message_id: &str) -> Result<(), PublishError> {
        let path = format!("/channels/{}/messages/{}/crosspost", channel_id, message_id);
        match self.request(Method::POST, &path, None).await {
            Ok(_) => Ok(()),
            Err(RestFailure::Status {
                code: Some(ALREADY_CROSSPOSTED),
                ..
            }) => {
                debug!(channel = %channel_id, message = %message_id, "already crossposted");
                Ok(())
            }
            Err(failure) => Err(failure.into()),
        }
    }

    pub async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<MessageData, FetchError> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let text = self.request(Method::GET, &path, None).await?;
        Ok(Self::decode(&text)?)
    }

    pub async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelData, FetchError> {
        let path = format!("/channels/{}", channel_id);
        let text = self.request(Method::GET, &path, None).await?;
        Ok(Self::decode(&text)?)
    }

    /// Post a plain text message.
    pub async fn create_message(&self, channel_id: &str, content: &str) -> GatewayResult<()> {
        let path = format!("/channels/{}/messages", channel_id);
        let body = serde_json::json!({ "content": content });
        self.request(Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// The bot's own identity. A 401 here means the credential is invalid.
    pub async fn current_user(&self) -> GatewayResult<UserData> {
        let text = self.request(Method::GET, "/users/@me", None).await?;
        Ok(Self::decode(&text)?)
    }
}

#[async_trait]
impl Publisher for RestClient {
    type Target = MessageRef;

    async fn publish(&self, target: &MessageRef) -> Result<(), PublishError> {
        RestClient::publish(self, &target.channel_id, &target.message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publish_retry_engine::ErrorClass;

    #[test]
    fn rate_limit_body_sets_retry_after() {
        let failure = RestFailure::from_response(
            429,
            Some("3"),
            r#"{"message":"You are being rate limited.","retry_after":5.0,"global":false}"#,
        );
        let err = PublishError::from(failure);
        assert_eq!(
            err.class(),
            ErrorClass::RateLimited {
                retry_after: Some(Duration::from_secs(5))
            }
        );
    }

    #[test]
    fn forbidden_maps_to_permanent() {
        let failure = RestFailure::from_response(403, None, r#"{"message":"Missing Permissions","code":50013}"#);
        let err = PublishError::from(failure.clone());
        assert_eq!(err.class(), ErrorClass::Permanent);
        assert!(err.to_string().contains("Missing Permissions"));

        assert!(matches!(FetchError::from(failure), FetchError::Forbidden(_)));
    }

    #[test]
    fn server_error_is_transient() {
        let failure = RestFailure::from_response(502, None, "<html>bad gateway</html>");
        assert_eq!(PublishError::from(failure.clone()).class(), ErrorClass::Transient);
        assert!(matches!(FetchError::from(failure), FetchError::Transient(_)));
    }

    #[test]
    fn not_found_fetch_is_permanent() {
        let failure = RestFailure::from_response(404, None, r#"{"message":"Unknown Message","code":10008}"#);
        assert_eq!(FetchError::from(failure), FetchError::NotFound("Unknown Message".to_string()));
    }

    #[test]
    fn unauthorized_identity_is_fatal() {
        let failure = RestFailure::from_response(401, None, r#"{"message":"401: Unauthorized","code":0}"#);
        let err = GatewayError::from(failure);
        assert!(err.is_fatal());
    }

    #[test]
    fn already_crossposted_code_is_parsed() {
        let failure = RestFailure::from_response(
            400,
            None,
            r#"{"message":"This message has already been crossposted.","code":40033}"#,
        );
        assert!(matches!(
            failure,
            RestFailure::Status {
                code: Some(ALREADY_CROSSPOSTED),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn closed_client_fails_without_network() {
        let client = RestClient::with_base_url("a.b.c", "http://127.0.0.1:9").unwrap();
        client.close();
        assert!(client.is_closed());

        let err = client.publish("1", "2").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(matches!(
            client.current_user().await,
            Err(GatewayError::Closed)
        ));
    }
}
