//! Length-prefixed framing for the game wire protocol.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +-------------------+-------------------+--------------------+
//! | length (2 bytes)  | opcode (2 bytes)  |   body             |
//! | u16 little-endian | u16 little-endian |   (length-2 bytes) |
//! +-------------------+-------------------+--------------------+
//! ```
//!
//! The length prefix counts the opcode plus the body, not itself, and must
//! lie in `1..=MAX_FRAME_SIZE`. A declared length of 0 or above the cap is a
//! protocol violation: with no delimiter other than the prefix there is no
//! way to resynchronize the stream, so the session must be torn down.
//!
//! The codec is pure byte manipulation. The session owns the two exact-size
//! reads (header, then body), which keeps the body allocation bounded by
//! [`MAX_FRAME_SIZE`] before it happens and makes length validation a single
//! comparison.

/// Maximum frame length (opcode + body) in bytes.
pub const MAX_FRAME_SIZE: usize = 8000;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Size of the opcode at the start of every frame payload.
pub const OPCODE_SIZE: usize = 2;

/// Errors that can occur while encoding or splitting frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoded frame would exceed the maximum frame size.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// The would-be frame length (opcode + body).
        size: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The frame payload is too short to carry an opcode.
    #[error("frame payload of {len} bytes cannot hold a 2-byte opcode")]
    MalformedFrame {
        /// The actual payload length.
        len: usize,
    },
}

/// Reinterpret the 2-byte length prefix as a frame length.
///
/// Performs no validation; callers check the result with
/// [`is_valid_length`] before acting on it.
pub fn decode_header(bytes: [u8; LENGTH_PREFIX_SIZE]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Whether a declared frame length is within protocol bounds.
pub fn is_valid_length(len: u16) -> bool {
    len > 0 && len as usize <= MAX_FRAME_SIZE
}

/// Split a frame payload into its opcode and message body.
pub fn split_payload(payload: &[u8]) -> Result<(u16, &[u8]), FrameError> {
    if payload.len() < OPCODE_SIZE {
        return Err(FrameError::MalformedFrame { len: payload.len() });
    }
    let opcode = u16::from_le_bytes([payload[0], payload[1]]);
    Ok((opcode, &payload[OPCODE_SIZE..]))
}

/// Encode a complete wire frame: length prefix, opcode, body.
///
/// Fails with [`FrameError::FrameTooLarge`] before any bytes are produced if
/// `opcode + body` would exceed [`MAX_FRAME_SIZE`]; the caller finds out
/// here, not the peer.
pub fn encode_frame(opcode: u16, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let frame_len = OPCODE_SIZE + body.len();
    if frame_len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: frame_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + frame_len);
    buf.extend_from_slice(&(frame_len as u16).to_le_bytes());
    buf.extend_from_slice(&opcode.to_le_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}
