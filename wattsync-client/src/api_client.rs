//! Remote fetch client: REST and WebSocket connections to the backend.

use crate::config::{AuthConfig, ClientConfig, ConfigError};
use crate::error::{FetchResult, SyncError};
use crate::subscribe::EventSource;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wattsync_core::ChangeEvent;

/// One request/response round trip to a named backend endpoint.
///
/// This is the seam between the synchronizers and the network: the
/// polling layer only sees this trait, so tests drive it with canned
/// fetchers instead of a live backend.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `endpoint` (a non-empty path relative to the API base) with
    /// the given query parameters. Exactly one network round trip per
    /// invocation; every failure mode is normalized into [`SyncError`].
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)])
        -> FetchResult<serde_json::Value>;
}

/// REST client carrying the base URL, auth headers, and request timeout.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }
}

#[async_trait]
impl Fetcher for RestClient {
    async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> FetchResult<serde_json::Value> {
        debug_assert!(!endpoint.trim().is_empty(), "endpoint must be non-empty");
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// WebSocket client for the realtime change-event channel.
#[derive(Clone)]
pub struct WsClient {
    endpoint: String,
    auth_header: HeaderMap,
}

impl WsClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: config.ws_endpoint.trim_end_matches('/').to_string(),
            auth_header: build_auth_headers(&config.auth)?,
        })
    }

    /// Open the long-lived connection for a named channel. Connection
    /// failures are [`SyncError::Network`]; once the stream is open,
    /// transport errors surface as [`SyncError::ConnectionDropped`].
    pub async fn open(&self, channel: &str) -> Result<WsEventSource, SyncError> {
        let uri = format!("{}/{}", self.endpoint, channel);
        let mut request = Request::builder()
            .uri(uri)
            .body(())
            .map_err(SyncError::network)?;
        let headers = request.headers_mut();
        for (name, value) in self.auth_header.iter() {
            headers.insert(name, value.clone());
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(SyncError::network)?;
        tracing::debug!(channel = channel, "realtime channel opened");
        Ok(WsEventSource {
            stream,
            channel: channel.to_string(),
        })
    }
}

/// An open realtime connection, yielding decoded change events.
pub struct WsEventSource {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    channel: String,
}

impl WsEventSource {
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn next_event(&mut self) -> Option<FetchResult<ChangeEvent>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(SyncError::decode));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(err) => return Some(Err(SyncError::ConnectionDropped(err.to_string()))),
            }
        }
        None
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ConfigError::InvalidValue {
                field: "auth.api_key",
                reason: e.to_string(),
            })?,
        );
    }
    if let Some(token) = &auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidValue {
                field: "auth.bearer_token",
                reason: e.to_string(),
            })?,
        );
    }
    Ok(headers)
}
