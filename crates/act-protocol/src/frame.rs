//! Length-prefixed framing.
//!
//! ```text
//! [0..4] : payload length (u32 BE)
//! [4..]  : payload (exactly `length` bytes)
//! ```
//!
//! Zero-length frames are keep-alive padding and are skipped by the
//! decoder. Frames above [`MAX_FRAME_LEN`] are rejected; the stream
//! cannot be resynchronised after that, so callers should drop the
//! connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// Largest accepted payload.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Append one frame carrying `payload` to `out`.
pub fn encode_frame(payload: &[u8], out: &mut BytesMut) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    out.reserve(LEN_PREFIX + payload.len());
    out.put_u32(payload.len() as u32);
    out.extend_from_slice(payload);
    Ok(())
}

/// Incremental decoder over a byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Feed bytes read from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, or `Ok(None)` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        loop {
            if self.buffer.len() < LEN_PREFIX {
                return Ok(None);
            }

            let len = u32::from_be_bytes([
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
            ]) as usize;

            if len > MAX_FRAME_LEN {
                return Err(ProtocolError::FrameTooLarge(len));
            }

            if len == 0 {
                self.buffer.advance(LEN_PREFIX);
                continue;
            }

            if self.buffer.len() < LEN_PREFIX + len {
                return Ok(None);
            }

            self.buffer.advance(LEN_PREFIX);
            return Ok(Some(self.buffer.split_to(len).freeze()));
        }
    }
}
