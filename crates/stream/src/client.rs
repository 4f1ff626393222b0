//! WebSocket client for the code-generation backend.
//!
//! [`CodegenClient`] holds the connection configuration. Call
//! [`CodegenClient::connect`] to open a live [`WsStream`]; the handshake is
//! bounded by the client's connect timeout.

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Path of the generation endpoint under the WebSocket base URL.
pub const GENERATE_CODE_PATH: &str = "/generate-code";

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw WebSocket stream to the backend.
pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the code-generation backend.
#[derive(Debug, Clone)]
pub struct CodegenClient {
    ws_url: String,
    connect_timeout: Duration,
}

impl CodegenClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:7001`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Full URL of the generation endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{GENERATE_CODE_PATH}", self.ws_url)
    }

    /// Open the WebSocket, failing if it is not established within the
    /// connect timeout. A timed-out handshake is dropped.
    pub async fn connect(&self) -> Result<WsStream, ClientError> {
        let url = self.endpoint();
        tracing::info!(url = %url, "Connecting to code generation backend");

        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| ClientError::Timeout {
                url: url.clone(),
                after: self.connect_timeout,
            })?
            .map_err(|e| ClientError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::info!(url = %url, "WebSocket connection established");
        Ok(ws_stream)
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection did not open in time.
    #[error("Connection timeout: could not connect to {url} within {after:?}")]
    Timeout { url: String, after: Duration },
}
