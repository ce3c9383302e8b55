//! JSON payload codec for [`Message`].
//!
//! One message per frame. Inbound payloads may omit `id`; the
//! receiving session stamps it.

use act_core::Message;
use bytes::BytesMut;

use crate::frame::encode_frame;
use crate::ProtocolError;

/// Encode `message` as one framed JSON payload appended to `out`.
pub fn encode_message(message: &Message, out: &mut BytesMut) -> Result<(), ProtocolError> {
    let payload =
        serde_json::to_vec(message).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    encode_frame(&payload, out)
}

/// Decode a single frame payload (without its length prefix).
pub fn decode_message(payload: &[u8]) -> Result<Message, ProtocolError> {
    let message: Message =
        serde_json::from_slice(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if message.message_type.is_empty() {
        return Err(ProtocolError::InvalidField("message_type"));
    }

    Ok(message)
}
