//! Game wire protocol: opcode space, typed messages, and the payload codec
//! plugged into the session engine.
//!
//! Message bodies are `postcard`-serialized serde structs. The session core
//! treats them as opaque bytes; this crate supplies the decode/encode
//! capabilities registered per opcode.

pub mod codec;
pub mod messages;
pub mod opcode;

pub use codec::{SendError, decode_message, encode_message, register_message, send_message};
