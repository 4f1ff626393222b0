use std::time::Duration;

use crate::client::{CodegenClient, DEFAULT_CONNECT_TIMEOUT};

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend. Call
/// `dotenvy::dotenv()` first if a `.env` file should be honoured.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket base URL of the generation backend.
    pub ws_backend_url: String,
    /// HTTP base URL for the side endpoints.
    pub http_backend_url: String,
    /// Bound on opening the generation channel.
    pub connect_timeout: Duration,
    /// Hosted deployment; selects user-facing connection error wording.
    pub is_running_on_cloud: bool,
    /// Identity forwarded with every request.
    pub user_id: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `WS_BACKEND_URL`       | `ws://127.0.0.1:7001`   |
    /// | `HTTP_BACKEND_URL`     | `http://127.0.0.1:7001` |
    /// | `CONNECT_TIMEOUT_SECS` | `10`                    |
    /// | `IS_RUNNING_ON_CLOUD`  | `false`                 |
    /// | `PIX2CODE_USER_ID`     | unset                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ws_backend_url =
            lookup("WS_BACKEND_URL").unwrap_or_else(|| "ws://127.0.0.1:7001".into());
        let http_backend_url =
            lookup("HTTP_BACKEND_URL").unwrap_or_else(|| "http://127.0.0.1:7001".into());

        let connect_timeout = match lookup("CONNECT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "CONNECT_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        let is_running_on_cloud = lookup("IS_RUNNING_ON_CLOUD")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let user_id = lookup("PIX2CODE_USER_ID").filter(|v| !v.trim().is_empty());

        Ok(Self {
            ws_backend_url,
            http_backend_url,
            connect_timeout,
            is_running_on_cloud,
            user_id,
        })
    }

    /// Build the WebSocket client described by this configuration.
    pub fn codegen_client(&self) -> CodegenClient {
        CodegenClient::new(self.ws_backend_url.clone()).with_connect_timeout(self.connect_timeout)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
