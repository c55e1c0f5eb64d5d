//! Framing: one JSON text per message, bounded in size.

use crate::protocol::{Envelope, Message};

const MAX_FRAME_LEN: usize = 16 * 1024 * 1024; // 16 MiB

/// Encode a message into a single JSON text frame.
pub fn encode_frame(msg: &Message) -> Result<String, FrameEncodeError> {
    let frame = serde_json::to_string(msg)?;
    if frame.len() > MAX_FRAME_LEN {
        return Err(FrameEncodeError::TooLarge);
    }
    Ok(frame)
}

/// Error encoding a message into a frame (serializer or size limit).
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("frame too large")]
    TooLarge,
}

/// Decode one frame into a loosely typed envelope. Unknown `type` values decode fine;
/// only non-JSON text, a missing `type`, or wrongly typed envelope fields fail.
pub fn decode_frame(frame: &str) -> Result<Envelope, FrameDecodeError> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(FrameDecodeError::TooLarge);
    }
    Ok(serde_json::from_str(frame)?)
}

/// Error decoding a frame (too large or not a valid envelope).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("frame too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
