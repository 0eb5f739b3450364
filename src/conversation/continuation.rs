use super::types::Message;

/// A two-message request: one user message and a partial assistant message.
///
/// The provider continues an assistant turn when the last message it receives
/// is from the assistant, so continuation text is appended to the assistant
/// slot instead of adding new messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationRequest {
    user: String,
    assistant: String,
}

impl ContinuationRequest {
    pub fn new(user: impl Into<String>, assistant_prefix: impl Into<String>) -> Self {
        let mut assistant = assistant_prefix.into();
        trim_end_in_place(&mut assistant);
        Self {
            user: user.into(),
            assistant,
        }
    }

    /// Text of the assistant slot so far.
    pub fn assistant(&self) -> &str {
        &self.assistant
    }

    /// Append model output to the assistant slot.
    ///
    /// Trailing whitespace is stripped; the API rejects a final assistant
    /// message that ends in whitespace.
    pub fn extend(&mut self, text: &str) {
        self.assistant.push_str(text);
        trim_end_in_place(&mut self.assistant);
    }

    /// The request as a message list, always exactly two entries long.
    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message::user(self.user.clone()),
            Message::assistant(self.assistant.clone()),
        ]
    }
}

fn trim_end_in_place(text: &mut String) {
    let trimmed_len = text.trim_end().len();
    text.truncate(trimmed_len);
}
