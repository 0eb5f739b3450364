//! Multi-turn structured code generation.
//!
//! A single reply is capped by `max_tokens`, so long outputs are collected
//! over several turns. Each turn's text is appended to the assistant slot of a
//! [`ContinuationRequest`] and the model is asked to continue from there until
//! the XML document closes, the reply comes back empty, or the turn budget
//! runs out.

use tracing::{debug, error, info, warn};

use crate::api::{MessagesRequest, ModelTransport, Usage};
use crate::conversation::ContinuationRequest;
use crate::response::{parse, CodeResponse, ParseStatus};

/// Maximum number of requests per structured run
pub const MAX_TURNS: usize = 10;

/// Placed between the raw texts of consecutive turns in [`CodeResponse::content`]
pub const TURN_SEPARATOR: &str = "\n-------------------------------\n";

/// First tokens of the assistant turn for structured runs
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// First token of the assistant turn for the plaintext fallback
pub const PLAINTEXT_PREFIX: &str = "FILE_CONTENTS:";

/// Appended to `/o` instructions so the model escapes code it puts in XML
pub const XML_ESCAPE_INSTRUCTION: &str = "\nMake sure to escape characters correctly inside the XML!";

const PLAINTEXT_INSTRUCTION: &str = "\n\nDo not use XML. Output the full contents of every file \
you would write, one after another. Put the relative path of each file on its own line \
before its contents.";

/// Drives a structured code-generation run against a [`ModelTransport`].
pub struct TurnController<'a, T: ModelTransport> {
    transport: &'a T,
    model: &'a str,
    max_tokens: u32,
}

impl<'a, T: ModelTransport> TurnController<'a, T> {
    pub fn new(transport: &'a T, model: &'a str, max_tokens: u32) -> Self {
        Self {
            transport,
            model,
            max_tokens,
        }
    }

    fn build_request(&self, request: &ContinuationRequest, system_prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.to_string(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: system_prompt.to_string(),
            messages: request.messages(),
        }
    }

    /// Run up to [`MAX_TURNS`] requests, continuing the assistant turn each time.
    ///
    /// Returns `None` when a request fails or the model returns an empty
    /// string. `request` is never modified; continuation happens on a copy.
    /// Running out of turns is not an error: the raw text is kept and the file
    /// list is empty.
    pub async fn run(
        &self,
        request: &ContinuationRequest,
        system_prompt: &str,
    ) -> Option<CodeResponse> {
        let mut request = request.clone();
        let mut chunks: Vec<String> = Vec::new();
        let mut usage = Usage::default();

        for turn in 1..=MAX_TURNS {
            let response = match self
                .transport
                .send(&self.build_request(&request, system_prompt))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Turn {} failed: {}", turn, e);
                    return None;
                }
            };
            usage += response.usage;
            info!("Received response (turn {}/{})", turn, MAX_TURNS);

            let force_parse = match response.first_text() {
                None => {
                    warn!("Received an empty list of content blocks");
                    true
                }
                Some("") => {
                    warn!("Received an empty response string");
                    return None;
                }
                Some(text) => {
                    chunks.push(text.to_string());
                    false
                }
            };

            let result = parse(&chunks, force_parse);
            debug!(
                "Parse after turn {}: finished={}, status={:?}, files={:?}",
                turn,
                result.finished,
                result.status,
                result.files.as_ref().map(Vec::len)
            );

            if result.finished || force_parse || result.status == ParseStatus::Malformed {
                let files = result.files.unwrap_or_else(|| {
                    warn!("Failed to parse AI responses");
                    Vec::new()
                });
                return Some(CodeResponse {
                    content: chunks.join(TURN_SEPARATOR),
                    files,
                    usage,
                });
            }

            if let Some(last) = chunks.last() {
                request.extend(last);
            }
            debug!("Assistant slot is now {} bytes", request.assistant().len());
            info!("Requesting a continuation from the model...");
        }

        warn!("Reached turn limit");
        Some(CodeResponse {
            content: chunks.join(TURN_SEPARATOR),
            files: Vec::new(),
            usage,
        })
    }

    /// One plain-text request used after a structured run produced no files.
    ///
    /// The assistant turn starts with [`PLAINTEXT_PREFIX`]. The reply is not
    /// parsed; callers persist it verbatim.
    pub async fn run_plaintext(&self, user: &str, system_prompt: &str) -> Option<CodeResponse> {
        let request = ContinuationRequest::new(
            format!("{}{}", user, PLAINTEXT_INSTRUCTION),
            PLAINTEXT_PREFIX,
        );

        let response = match self
            .transport
            .send(&self.build_request(&request, system_prompt))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Plaintext request failed: {}", e);
                return None;
            }
        };

        let text = response.joined_text();
        if text.is_empty() {
            warn!("Plaintext fallback returned no text");
            return None;
        }

        Some(CodeResponse {
            content: text,
            files: Vec::new(),
            usage: response.usage,
        })
    }
}
