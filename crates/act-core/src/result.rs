//! What a retrieval hands back to a handler.

use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;
use crate::message::Message;
use crate::status::RequestStatus;

/// Outcome of a single-answer retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub checkpoint: Checkpoint,
    pub status: RequestStatus,
    /// The classified message; always `None` on timeout or cancellation.
    pub message: Option<Message>,
}

impl MatchResult {
    pub fn matched(checkpoint: Checkpoint, status: RequestStatus, message: Message) -> Self {
        MatchResult {
            checkpoint,
            status,
            message: Some(message),
        }
    }

    pub fn unmatched(checkpoint: Checkpoint, status: RequestStatus) -> Self {
        MatchResult {
            checkpoint,
            status,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of a "collect many" retrieval. Messages keep arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub checkpoint: Checkpoint,
    pub status: RequestStatus,
    pub messages: Vec<Message>,
}

impl AggregateResult {
    pub fn new(checkpoint: Checkpoint, status: RequestStatus, messages: Vec<Message>) -> Self {
        AggregateResult {
            checkpoint,
            status,
            messages,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
