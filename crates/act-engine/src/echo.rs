//! Echo correlation for outbound messages.
//!
//! The session reflects every message it sends back into the stream
//! with its assigned sequence. Waiting for that echo gives later
//! filters the stream-assigned fields (e.g. a reject's `RefSeqNum`
//! pointing at our sequence).
//!
//! The echo is watched through its own short-lived subscription, armed
//! *before* the send so the echo cannot slip past, and independent of
//! the scope's prefilter.

use std::sync::Arc;

use act_core::{ActError, ActResult, Direction, FilterSet, Message, RequestStatus};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::router::{MessageRouter, Subscription};
use crate::strategy::first_matching;
use crate::timeout::Deadline;

/// An armed echo watch for one outbound message.
#[derive(Debug)]
pub struct PendingEcho {
    subscription: Subscription,
    message_type: String,
    key_field: String,
    key_value: String,
}

impl PendingEcho {
    /// Start watching for the echo of `outbound`, correlated on the
    /// value of `key_field`.
    pub fn arm(router: &Arc<MessageRouter>, outbound: &Message, key_field: &str) -> ActResult<Self> {
        let key_value = outbound
            .get_str(key_field)
            .ok_or_else(|| ActError::MissingEchoKey {
                message_type: outbound.message_type.clone(),
                key_field: key_field.to_string(),
            })?
            .to_string();

        let session = outbound.session_alias().to_string();
        let message_type = outbound.message_type.clone();

        let prefilter = {
            let key_field = key_field.to_string();
            let key_value = key_value.clone();
            let message_type = message_type.clone();
            move |m: &Message| {
                m.direction() == Direction::Outgoing
                    && m.session_alias() == session
                    && m.is_type(&message_type)
                    && m.field_eq(&key_field, &key_value)
            }
        };

        Ok(PendingEcho {
            subscription: router.subscribe(Arc::new(prefilter)),
            message_type,
            key_field: key_field.to_string(),
            key_value,
        })
    }

    /// Wait for the echo. Missing echo is fatal for the call.
    pub async fn wait(
        mut self,
        deadline: Deadline,
        cancel: &CancellationToken,
        act: &str,
    ) -> ActResult<Message> {
        let any = FilterSet::new().success("echo", |_: &Message| true);
        let found = first_matching(self.subscription.buffer(), &any, deadline, cancel).await;
        self.subscription.release();

        match (found.status, found.message) {
            (RequestStatus::Success, Some(echo)) => {
                debug!(id = %echo.id, key = %self.key_value, "echo received");
                Ok(Arc::unwrap_or_clone(echo))
            }
            (RequestStatus::Cancelled, _) => Err(ActError::Cancelled {
                act: act.to_string(),
            }),
            _ => Err(ActError::EchoTimeout {
                message_type: self.message_type,
                key_field: self.key_field,
                key_value: self.key_value,
                waited: deadline.budget(),
            }),
        }
    }
}
