//! Error types for act calls.
//!
//! Only failures live here. A timeout or a business reject is a
//! [`RequestStatus`](crate::RequestStatus), not an error.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActError {
    /// The scope was already torn down (e.g. after a failed send).
    /// This is a programmer error in the calling handler.
    #[error("request scope `{act}` is closed")]
    ScopeClosed { act: String },

    /// Every wait must be bounded and non-zero.
    #[error("invalid wait of {requested:?}: must be non-zero and at most {max:?}")]
    InvalidWait { requested: Duration, max: Duration },

    /// The transport rejected the outbound message.
    #[error("sending {message_type} on session `{session}` failed: {reason}")]
    SendFailed {
        session: String,
        message_type: String,
        reason: String,
    },

    /// The outbound message was never echoed back into the stream.
    #[error("no echo of {message_type} with {key_field}={key_value} within {waited:?}")]
    EchoTimeout {
        message_type: String,
        key_field: String,
        key_value: String,
        waited: Duration,
    },

    #[error("{message_type} has no echo key field `{key_field}`")]
    MissingEchoKey {
        message_type: String,
        key_field: String,
    },

    /// The call was cancelled while a send was waiting for its echo.
    #[error("act `{act}` was cancelled")]
    Cancelled { act: String },
}

pub type ActResult<T> = Result<T, ActError>;
