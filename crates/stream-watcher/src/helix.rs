//! Helix API client with an app access token.

use crate::{WatcherError, WatcherResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client-credentials token endpoint.
pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Helix API base URL.
pub const HELIX_API_BASE: &str = "https://api.twitch.tv/helix";

const TIMEOUT_SECS: u64 = 30;

/// A live broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveStream {
    /// Stream id; stable for the lifetime of one broadcast.
    pub id: String,
    pub user_login: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct StreamsPage {
    #[serde(default)]
    data: Vec<LiveStream>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Source of live status per streamer.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// The current broadcast, or `None` when offline.
    async fn live_stream(&self, username: &str) -> WatcherResult<Option<LiveStream>>;
}

/// Helix client. The access token is fetched lazily and refreshed once
/// when a request is rejected with 401.
pub struct HelixClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_base: String,
    token: RwLock<Option<String>>,
}

impl HelixClient {
    pub fn new(client_id: &str, client_secret: &str) -> WatcherResult<Self> {
        Self::with_endpoints(client_id, client_secret, TWITCH_TOKEN_URL, HELIX_API_BASE)
    }

    /// Create a client against custom endpoints.
    pub fn with_endpoints(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        api_base: &str,
    ) -> WatcherResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: token_url.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Request a fresh app access token and cache it.
    async fn refresh_token(&self) -> WatcherResult<String> {
        let response = self
            .http
            .post(&self.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "access token request rejected");
            return Err(WatcherError::Auth(status.as_u16()));
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        info!("obtained streaming platform access token");
        *self.token.write() = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn access_token(&self) -> WatcherResult<String> {
        let cached = self.token.read().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    async fn get_streams(&self, username: &str, token: &str) -> WatcherResult<reqwest::Response> {
        let url = format!("{}/streams", self.api_base);
        Ok(self
            .http
            .get(&url)
            .query(&[("user_login", username)])
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .send()
            .await?)
    }
}

#[async_trait]
impl StreamSource for HelixClient {
    async fn live_stream(&self, username: &str) -> WatcherResult<Option<LiveStream>> {
        let token = self.access_token().await?;
        let mut response = self.get_streams(username, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(streamer = %username, "access token expired, refreshing");
            let token = self.refresh_token().await?;
            response = self.get_streams(username, &token).await?;
        }

        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(WatcherError::Auth(status.as_u16()));
        }
        if !status.is_success() {
            return Err(WatcherError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let page: StreamsPage = serde_json::from_str(&text)?;
        Ok(page.data.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection, recording request heads.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                log.lock().push(String::from_utf8_lossy(&head).to_string());

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (base, seen)
    }

    #[test]
    fn streams_page_parsing() {
        let page: StreamsPage = serde_json::from_str(
            r#"{"data":[{"id":"4001","user_login":"alice","title":"hi","viewer_count":3}],"pagination":{}}"#,
        )
        .unwrap();
        assert_eq!(page.data[0].id, "4001");

        let empty: StreamsPage = serde_json::from_str(r#"{"data":[],"pagination":{}}"#).unwrap();
        assert!(empty.data.is_empty());
    }

    #[tokio::test]
    async fn live_stream_with_fresh_token() {
        let (base, seen) = serve(vec![
            (200, r#"{"access_token":"t1","expires_in":3600,"token_type":"bearer"}"#),
            (200, r#"{"data":[{"id":"4001","user_login":"alice","title":"hi"}]}"#),
        ])
        .await;
        let client =
            HelixClient::with_endpoints("cid", "secret", &format!("{}/oauth2/token", base), &base).unwrap();

        let stream = client.live_stream("alice").await.unwrap().unwrap();
        assert_eq!(stream.id, "4001");

        let seen = seen.lock();
        assert!(seen[0].starts_with("POST /oauth2/token?"));
        assert!(seen[0].contains("grant_type=client_credentials"));
        assert!(seen[1].starts_with("GET /streams?user_login=alice"));
        assert!(seen[1].to_lowercase().contains("authorization: bearer t1"));
    }

    #[tokio::test]
    async fn unauthorized_refreshes_token_once() {
        let (base, seen) = serve(vec![
            (200, r#"{"access_token":"t1"}"#),
            (401, r#"{"status":401,"message":"Invalid OAuth token"}"#),
            (200, r#"{"access_token":"t2"}"#),
            (200, r#"{"data":[]}"#),
        ])
        .await;
        let client =
            HelixClient::with_endpoints("cid", "secret", &format!("{}/oauth2/token", base), &base).unwrap();

        assert_eq!(client.live_stream("alice").await.unwrap(), None);
        assert_eq!(client.token.read().as_deref(), Some("t2"));
        assert!(seen.lock()[3].to_lowercase().contains("authorization: bearer t2"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let (base, _) = serve(vec![(400, r#"{"status":400,"message":"invalid client"}"#)]).await;
        let client =
            HelixClient::with_endpoints("cid", "bad", &format!("{}/oauth2/token", base), &base).unwrap();

        assert!(matches!(
            client.live_stream("alice").await,
            Err(WatcherError::Auth(400))
        ));
    }
}
