//! TCP session protocol engine: length-prefixed framing, opcode dispatch,
//! per-connection read/write state machines, and the accept loop.

pub mod dispatch;
pub mod framing;
pub mod gateway;
pub mod session;

pub use dispatch::{DecodeError, DispatchOutcome, DispatchRegistry};
pub use framing::{FrameError, MAX_FRAME_SIZE, decode_header, encode_frame, split_payload};
pub use gateway::{
    CapacityReached, ConnectionId, Gateway, GatewayConfig, IdGenerator, SessionMap,
};
pub use session::{DisconnectReason, NoopHooks, Session, SessionHandle, SessionHooks};
