use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::error::TransportError;
use super::types::{MessagesRequest, MessagesResponse};
use super::ModelTransport;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Version header value required by the Messages API
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MESSAGES_ENDPOINT: &str = "v1/messages";

/// CLI version (from Cargo.toml)
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_user_agent() -> String {
    format!("claudecli/{}", VERSION)
}

/// HTTP client for the Anthropic Messages API
pub struct AnthropicClient {
    client: Client,
    messages_url: Url,
    api_key: String,
    user_agent: String,
    session_id: String,
}

impl AnthropicClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            messages_url: Self::build_url(base_url, MESSAGES_ENDPOINT)?,
            api_key: api_key.into(),
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    fn build_url(base_url: &str, endpoint: &str) -> Result<Url> {
        // Url::join drops the last path segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{}/", base_url))
        }
        .with_context(|| format!("Invalid base URL: {}", base_url))?;

        base.join(endpoint)
            .with_context(|| format!("Failed to build URL for endpoint: {}", endpoint))
    }
}

impl ModelTransport for AnthropicClient {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, TransportError> {
        let request_id = Uuid::new_v4().to_string();

        debug!("=== API Request ===");
        debug!("URL: {}", self.messages_url);
        debug!(
            "Model: {}, max_tokens: {}, temperature: {}, messages: {}",
            request.model,
            request.max_tokens,
            request.temperature,
            request.messages.len()
        );

        let response = self
            .client
            .post(self.messages_url.clone())
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-request-id", &request_id)
            .header("x-request-session-id", &self.session_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!("=== API Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("API request failed with status {}: {}", status, error_text);
            return Err(TransportError::from_http_response(
                status.as_u16(),
                &error_text,
            ));
        }

        let response_text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        debug!(
            "Received {} content block(s), stop_reason: {:?}, usage: {}",
            parsed.content.len(),
            parsed.stop_reason,
            parsed.usage
        );

        Ok(parsed)
    }
}
