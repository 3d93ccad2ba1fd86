//! WebSocket client for the gatekeeper endpoint

use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue, Request},
        protocol::WebSocketConfig,
    },
};
use tracing::{debug, info, warn};

/// Default gatekeeper endpoint
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:22408";

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug)]
pub enum WsClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Target WebSocket URL
    pub url: String,

    /// Extra handshake headers
    pub headers: Vec<(String, String)>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Largest accepted inbound message
    pub max_message_size: usize,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            headers: Vec::new(),
            connect_timeout: Duration::from_secs(10),
            max_message_size: 1 << 20, // 1MB
        }
    }
}

impl WsClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// WebSocket client wrapper
pub struct WsClient {
    stream: WsStream,
    url: String,
}

impl WsClient {
    /// Connect to the gatekeeper
    pub async fn connect(config: WsClientConfig) -> Result<Self, WsClientError> {
        let request = Self::build_request(&config)?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);

        debug!("Connecting to {}", config.url);

        let connect = connect_async_with_config(request, Some(ws_config), false);
        let (stream, response) = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| WsClientError::Timeout(config.connect_timeout))?
            .map_err(|e| WsClientError::ConnectionFailed(e.to_string()))?;

        info!(
            "Connected to gatekeeper at {}, status: {}",
            config.url,
            response.status()
        );

        Ok(Self {
            stream,
            url: config.url,
        })
    }

    /// Build the HTTP upgrade request
    fn build_request(config: &WsClientConfig) -> Result<Request<()>, WsClientError> {
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| WsClientError::InvalidUrl(e.to_string()))?;

        let headers = request.headers_mut();
        for (key, value) in &config.headers {
            match (
                key.parse::<HeaderName>(),
                value.parse::<HeaderValue>(),
            ) {
                (Ok(name), Ok(val)) => {
                    headers.insert(name, val);
                }
                _ => warn!("Skipping invalid header {}", key),
            }
        }

        Ok(request)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn into_stream(self) -> WsStream {
        self.stream
    }
}
