use serde::{Deserialize, Serialize};

use super::types::{Message, Role};

/// Ordered list of completed user/assistant exchanges.
///
/// Values are never mutated in place: recording a turn returns a new history,
/// so a failed request leaves the caller's copy exactly as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages to send for a new user message: the history followed by `user`.
    pub fn request_messages(&self, user: &str) -> Vec<Message> {
        let mut messages = self.messages.clone();
        messages.push(Message::user(user));
        messages
    }

    /// A copy of this history with one more exchange appended.
    pub fn with_turn(&self, user: impl Into<String>, assistant: impl Into<String>) -> Self {
        let mut messages = self.messages.clone();
        messages.push(Message::user(user));
        messages.push(Message::assistant(assistant));
        Self { messages }
    }

    /// Content of the most recent assistant message.
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}
