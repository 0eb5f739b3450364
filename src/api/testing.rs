//! In-memory transport for tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::types::ContentBlock;
use super::{MessagesRequest, MessagesResponse, ModelTransport, TransportError, Usage};

/// Replays canned replies and records every request it receives.
pub(crate) struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<MessagesResponse, TransportError>>>,
    pub(crate) requests: RefCell<Vec<MessagesRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Result<MessagesResponse, TransportError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ModelTransport for ScriptedTransport {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".into())))
    }
}

pub(crate) fn text_reply(text: &str) -> Result<MessagesResponse, TransportError> {
    Ok(MessagesResponse {
        content: vec![ContentBlock {
            kind: "text".to_string(),
            text: Some(text.to_string()),
        }],
        usage: Usage {
            input_tokens: 100,
            output_tokens: 10,
            ..Usage::default()
        },
        stop_reason: None,
    })
}

pub(crate) fn empty_reply() -> Result<MessagesResponse, TransportError> {
    Ok(MessagesResponse::default())
}
