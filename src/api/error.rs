use thiserror::Error;

use super::types::ErrorEnvelope;

/// Failure of a single request to the model provider.
///
/// Every variant aborts the current turn. Only [`Connection`](Self::Connection)
/// and [`Timeout`](Self::Timeout) are network-level failures; the others mean the
/// server answered but the answer is unusable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection timed out")]
    Timeout,

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }

    /// Build an [`Api`](Self::Api) error from a non-success status and raw body.
    pub fn from_http_response(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|e| {
                if e.error.kind.is_empty() {
                    e.error.message
                } else {
                    format!("{}: {}", e.error.kind, e.error.message)
                }
            })
            .unwrap_or_else(|| body.trim().to_string());

        let message = match status {
            400 => format!("Invalid request. {}", detail),
            401 => "Invalid API key. Check ANTHROPIC_API_KEY.".to_string(),
            403 => format!("Permission denied. {}", detail),
            429 => "Rate limit or maximum monthly limit exceeded. Please wait and try again."
                .to_string(),
            500 => "Internal server error.".to_string(),
            502 | 503 | 529 => "The server seems to be overloaded, try again.".to_string(),
            _ if detail.is_empty() => "Unknown error.".to_string(),
            _ => detail,
        };

        Self::Api { status, message }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}
