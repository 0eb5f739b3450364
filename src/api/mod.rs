//! Model transport.
//!
//! [`ModelTransport`] is the seam between the turn logic and the network: the
//! session talks to the real [`AnthropicClient`], tests substitute a scripted
//! implementation.

mod client;
mod error;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AnthropicClient, DEFAULT_TIMEOUT_SECS};
pub use error::TransportError;
pub use types::{MessagesRequest, MessagesResponse, Usage};

/// Sends one request to the model and returns its reply.
///
/// Implementations do not retry; a failed call is reported as-is and the
/// caller decides what to do with the conversation.
#[allow(async_fn_in_trait)]
pub trait ModelTransport {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, TransportError>;
}
