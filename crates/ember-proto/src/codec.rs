//! Payload codec and registration glue between typed messages and the
//! session engine.

use ember_net::dispatch::{DecodeError, DispatchRegistry};
use ember_net::framing::FrameError;
use ember_net::session::SessionHandle;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors that can occur when sending a typed message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The message failed to serialize.
    #[error("message serialization failed: {0}")]
    Encode(#[from] postcard::Error),

    /// The serialized message does not fit in a frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Serialize a message body.
pub fn encode_message<M: Serialize>(message: &M) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(message)
}

/// Deserialize a message body.
///
/// Fails with [`DecodeError`] on malformed input; for a body arriving over
/// the wire on a known opcode that failure is terminal for the session.
pub fn decode_message<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, DecodeError> {
    postcard::from_bytes(bytes).map_err(|err| DecodeError::new(err.to_string()))
}

/// Register a typed handler for an opcode: bodies are decoded as `M` before
/// the handler runs.
pub fn register_message<M, H>(registry: &mut DispatchRegistry, opcode: u16, handler: H)
where
    M: DeserializeOwned + 'static,
    H: Fn(&SessionHandle, M) + Send + Sync + 'static,
{
    registry.register(opcode, decode_message::<M>, handler);
}

/// Serialize `message`, frame it under `opcode`, and enqueue it on the
/// session. The frame-size check happens here, before anything is queued.
pub fn send_message<M: Serialize>(
    session: &SessionHandle,
    opcode: u16,
    message: &M,
) -> Result<(), SendError> {
    let body = postcard::to_allocvec(message)?;
    session.send(opcode, &body)?;
    Ok(())
}
