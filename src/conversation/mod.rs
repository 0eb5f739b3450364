//! Conversation state threaded between prompts.

mod continuation;
mod history;
mod types;

pub use continuation::ContinuationRequest;
pub use history::ConversationHistory;
pub use types::{Message, Role};
