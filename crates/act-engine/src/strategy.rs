//! Filter evaluation strategies.
//!
//! Three retrieval shapes, each evaluated against one subscription
//! buffer with an ordered [`FilterSet`]:
//!
//! - [`first_matching`]: single terminal answer (ack / reject).
//! - [`all_matching`]: burst of an unknown number of replies, collected
//!   over a quiescence window.
//! - [`all_before_matching`]: fragmented reply whose last part carries
//!   a sentinel; the boundary message is included.
//!
//! Each strategy scans from the start of the buffer, so a retrieval
//! sees every message since its scope opened.

use std::sync::Arc;

use act_core::{Classification, FilterSet, Message, RequestStatus};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::SubscriptionBuffer;
use crate::timeout::{wait_for_append, wait_out, Deadline, Wakeup};

/// Result of [`first_matching`], before a checkpoint is attached.
#[derive(Debug, Clone)]
pub struct FirstMatch {
    pub status: RequestStatus,
    pub message: Option<Arc<Message>>,
}

/// Result of the "all-" strategies, before a checkpoint is attached.
#[derive(Debug, Clone)]
pub struct Collected {
    pub status: RequestStatus,
    pub messages: Vec<Arc<Message>>,
}

/// Return the earliest buffered message any filter accepts, classified
/// by the first such filter in declaration order.
pub async fn first_matching(
    buffer: &SubscriptionBuffer,
    filters: &FilterSet,
    deadline: Deadline,
    cancel: &CancellationToken,
) -> FirstMatch {
    let mut rx = buffer.watch();
    let mut cursor = 0;

    loop {
        rx.borrow_and_update();

        for message in buffer.messages_from(cursor) {
            cursor += 1;
            if let Some(filter) = filters.classify(&message) {
                debug!(
                    filter = filter.name(),
                    id = %message.id,
                    message_type = %message.message_type,
                    "first matching resolved"
                );
                return FirstMatch {
                    status: filter.classification().into(),
                    message: Some(message),
                };
            }
        }

        match wait_for_append(&mut rx, &deadline, cancel).await {
            Wakeup::Appended => continue,
            Wakeup::Expired => {
                return FirstMatch {
                    status: RequestStatus::Timeout,
                    message: None,
                }
            }
            Wakeup::Cancelled => {
                return FirstMatch {
                    status: RequestStatus::Cancelled,
                    message: None,
                }
            }
        }
    }
}

/// Wait out the window, then return every message whose first matching
/// filter is success-classified, in arrival order.
///
/// An empty result is a success. If any message resolves to an
/// error-classified filter the overall status is `Error`; those
/// messages are not part of the result.
pub async fn all_matching(
    buffer: &SubscriptionBuffer,
    filters: &FilterSet,
    window: Deadline,
    cancel: &CancellationToken,
) -> Collected {
    let wakeup = wait_out(&window, cancel).await;

    let mut status = RequestStatus::Success;
    let mut messages = Vec::new();

    for message in buffer.snapshot() {
        match filters.classify(&message).map(|f| f.classification()) {
            Some(Classification::Success) => messages.push(message),
            Some(Classification::Error) => {
                debug!(id = %message.id, "error-classified message inside window");
                status = RequestStatus::Error;
            }
            None => {}
        }
    }

    if wakeup == Wakeup::Cancelled {
        status = RequestStatus::Cancelled;
    }

    debug!(matched = messages.len(), %status, "all matching resolved");
    Collected { status, messages }
}

/// Collect every buffered message up to and including the first one
/// any filter accepts. The terminal filter's classification becomes
/// the status. Without a terminal message the partial collection is
/// returned as `Timeout` (or `Cancelled`).
pub async fn all_before_matching(
    buffer: &SubscriptionBuffer,
    filters: &FilterSet,
    deadline: Deadline,
    cancel: &CancellationToken,
) -> Collected {
    let mut rx = buffer.watch();
    let mut cursor = 0;
    let mut messages = Vec::new();

    loop {
        rx.borrow_and_update();

        for message in buffer.messages_from(cursor) {
            cursor += 1;
            let terminal = filters.classify(&message).map(|f| f.classification());
            messages.push(message);

            if let Some(classification) = terminal {
                debug!(collected = messages.len(), "terminal message reached");
                return Collected {
                    status: classification.into(),
                    messages,
                };
            }
        }

        let status = match wait_for_append(&mut rx, &deadline, cancel).await {
            Wakeup::Appended => continue,
            Wakeup::Expired => RequestStatus::Timeout,
            Wakeup::Cancelled => RequestStatus::Cancelled,
        };

        debug!(collected = messages.len(), %status, "no terminal message");
        return Collected { status, messages };
    }
}
