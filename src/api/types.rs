//! API request and response types for the Anthropic Messages endpoint.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use crate::conversation::Message;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    pub messages: Vec<Message>,
}

/// One block of the reply's `content` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Token counts reported for a request, or summed over several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.cache_creation_input_tokens
            + self.cache_read_input_tokens
            + self.output_tokens
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "input {} / cache write {} / cache read {} / output {}",
            self.input_tokens,
            self.cache_creation_input_tokens,
            self.cache_read_input_tokens,
            self.output_tokens
        )
    }
}

/// Response body of a successful `POST /v1/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Text of the first content block, if the reply has one.
    ///
    /// Code-generation turns only ever look at a single text payload.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(|b| b.text.as_deref())
    }

    /// All text blocks joined in order. Non-text blocks are skipped.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

/// Error envelope returned by the API on non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            input_tokens: 10,
            cache_creation_input_tokens: 1,
            cache_read_input_tokens: 2,
            output_tokens: 5,
        };
        total += Usage {
            input_tokens: 3,
            output_tokens: 4,
            ..Usage::default()
        };

        assert_eq!(total.input_tokens, 13);
        assert_eq!(total.output_tokens, 9);
        assert_eq!(total.total(), 25);
    }

    #[test]
    fn test_response_deserializes_with_missing_cache_fields() {
        let json = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "<root>"}],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 12, "output_tokens": 4000}
        }"#;

        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_text(), Some("<root>"));
        assert_eq!(response.usage.output_tokens, 4000);
        assert_eq!(response.usage.cache_read_input_tokens, 0);
        assert_eq!(response.stop_reason.as_deref(), Some("max_tokens"));
    }

    #[test]
    fn test_empty_content_has_no_text() {
        let response: MessagesResponse =
            serde_json::from_str(r#"{"content": [], "usage": {}}"#).unwrap();
        assert!(response.first_text().is_none());
        assert_eq!(response.joined_text(), "");
    }

    #[test]
    fn test_request_omits_empty_system_prompt() {
        let request = MessagesRequest {
            model: "m".into(),
            max_tokens: 10,
            temperature: 0.0,
            system: String::new(),
            messages: vec![Message::new(Role::User, "hi")],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("system").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }
}
