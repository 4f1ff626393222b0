//! REST client for the backend's side endpoints.
//!
//! Wraps the plain request/response JSON calls that sit next to the
//! generation channel (URL screenshots, webpage-to-video, credit balance and
//! analytics, payment verification, pricing) using [`reqwest`].

use serde::{Deserialize, Serialize};

/// HTTP client for the pix2code backend.
pub struct Pix2CodeApi {
    client: reqwest::Client,
    api_url: String,
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotRequest<'a> {
    url: &'a str,
    api_key: &'a str,
    user_id: &'a str,
}

/// Response of `POST /api/screenshot`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotResponse {
    /// The screenshot as a `data:image/png;base64,...` URL.
    pub url: String,
    pub credits_used: i64,
    pub credits_remaining: i64,
}

/// Response of `POST /webpage-to-video`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebpageVideoResponse {
    pub message: String,
    pub video_path: String,
}

/// Response of `GET /api/credit-usage/user/{id}/summary`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditSummary {
    pub user_id: String,
    pub credits_remaining: i64,
    pub credits_used: i64,
    pub total_credits_purchased: i64,
    pub plan: String,
    pub last_usage_date: Option<String>,
    pub usage_this_month: i64,
    #[serde(default)]
    pub available_features: Vec<String>,
}

/// One row of credit usage history.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditUsageEntry {
    pub user_id: String,
    pub feature_type: String,
    pub credits_used: i64,
    pub model_used: String,
    pub framework: String,
    pub input_type: String,
    pub created_at: String,
}

/// Response of `GET /api/credit-usage/user/{id}/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditHistoryPage {
    pub history: Vec<CreditUsageEntry>,
    pub total_count: i64,
}

/// Response of `POST /verify-payment`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// `"development"` when the backend has no billing provider configured.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub session: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingPlan {
    pub id: String,
    pub name: String,
    pub credits: i64,
    pub price: f64,
    pub price_per_credit: f64,
    pub description: String,
    #[serde(default)]
    pub popular: bool,
}

/// Response of `GET /pricing`.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingResponse {
    pub plans: Vec<PricingPlan>,
    pub currency: String,
    pub price_per_credit: f64,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl Pix2CodeApi {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:7001`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Capture a screenshot of `url` as a data URL, charged to `user_id`.
    pub async fn capture_screenshot(
        &self,
        url: &str,
        api_key: &str,
        user_id: &str,
    ) -> Result<ScreenshotResponse, ApiError> {
        let body = ScreenshotRequest {
            url,
            api_key,
            user_id,
        };
        let response = self
            .client
            .post(self.endpoint("/api/screenshot"))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Render a short explainer video from a webpage.
    pub async fn webpage_to_video(&self, url: &str) -> Result<WebpageVideoResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/webpage-to-video"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn credit_summary(&self, user_id: &str) -> Result<CreditSummary, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/api/credit-usage/user/{user_id}/summary")))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn credit_history(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<CreditHistoryPage, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/api/credit-usage/user/{user_id}/history")))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Usage analytics; the shape is backend-defined, so it stays raw JSON.
    pub async fn credit_analytics(&self, user_id: &str) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("/api/credit-usage/user/{user_id}/analytics")))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Confirm a checkout session completed after the billing redirect.
    pub async fn verify_payment(&self, session_id: &str) -> Result<PaymentVerification, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/verify-payment"))
            .json(&serde_json::json!({ "session_id": session_id }))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    pub async fn pricing(&self) -> Result<PricingResponse, ApiError> {
        let response = self.client.get(self.endpoint("/pricing")).send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Returns the response unchanged on success, or an
    /// [`ApiError::Status`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "Backend API call failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
