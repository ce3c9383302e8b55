//! Outbound seam to the downstream counterparty.

use act_core::Message;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session `{0}` is not connected")]
    NotConnected(String),

    #[error("message could not be encoded: {0}")]
    Encode(String),

    #[error("send rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Sends a message and reports whether the send itself succeeded.
///
/// Replies are not the transport's concern. Implementations that
/// support echoes deliver the sequenced copy of `message` back into
/// the [`MessageRouter`](crate::MessageRouter) after a successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), TransportError>;
}
