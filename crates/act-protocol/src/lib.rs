//! act-protocol
//!
//! Wire-level encoding/decoding for act sessions.
//!
//! This crate turns logical [`act_core::Message`]s into bytes and back:
//!
//! - [`frame`]      : length-prefixed framing over a TCP stream
//! - [`json_codec`] : JSON payload for a single message

use std::fmt;

pub mod frame;
pub mod json_codec;

pub use frame::{encode_frame, FrameDecoder, MAX_FRAME_LEN};
pub use json_codec::{decode_message, encode_message};

/// Errors that can arise when encoding/decoding a frame.
#[derive(Debug)]
pub enum ProtocolError {
    /// Declared or actual payload length above [`MAX_FRAME_LEN`].
    FrameTooLarge(usize),
    /// Payload is not a valid message document.
    Malformed(String),
    /// Structurally valid, but a required field is unusable.
    InvalidField(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::FrameTooLarge(len) => {
                write!(f, "Frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN)
            }
            ProtocolError::Malformed(reason) => write!(f, "Malformed message: {}", reason),
            ProtocolError::InvalidField(field) => write!(f, "Invalid field: {}", field),
        }
    }
}

impl std::error::Error for ProtocolError {}
