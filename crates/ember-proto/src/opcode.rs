//! Opcode assignments for the game protocol.
//!
//! Client-to-server opcodes live in 1..=99, server-to-client in 101..=199.
//! Values absent from the dispatch registry are dropped on receipt, so new
//! opcodes can be added without breaking older builds.

/// Client requests login with credentials.
pub const CS_LOG_IN: u16 = 1;

/// Client sets its display nickname.
pub const CS_SET_NICKNAME: u16 = 2;

/// Client enters a game field.
pub const CS_ENTER_FIELD: u16 = 3;

/// Client leaves its current field.
pub const CS_LEAVE_FIELD: u16 = 4;

/// Client moves an object it controls.
pub const CS_MOVE_OBJECT: u16 = 5;

/// Client uses a skill.
pub const CS_USE_SKILL: u16 = 6;

/// Client heartbeat ping.
pub const CS_PING: u16 = 7;

/// Server login result.
pub const SC_LOG_IN: u16 = 101;

/// Server nickname result.
pub const SC_SET_NICKNAME: u16 = 102;

/// Server field-entry result.
pub const SC_ENTER_FIELD: u16 = 103;

/// Server field-leave result.
pub const SC_LEAVE_FIELD: u16 = 104;

/// Server object-movement update.
pub const SC_MOVE_OBJECT: u16 = 105;

/// Server skill-use result.
pub const SC_USE_SKILL: u16 = 106;

/// Server heartbeat pong.
pub const SC_PING: u16 = 107;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u16) -> &'static str {
    match opcode {
        CS_LOG_IN => "CS_LOG_IN",
        CS_SET_NICKNAME => "CS_SET_NICKNAME",
        CS_ENTER_FIELD => "CS_ENTER_FIELD",
        CS_LEAVE_FIELD => "CS_LEAVE_FIELD",
        CS_MOVE_OBJECT => "CS_MOVE_OBJECT",
        CS_USE_SKILL => "CS_USE_SKILL",
        CS_PING => "CS_PING",
        SC_LOG_IN => "SC_LOG_IN",
        SC_SET_NICKNAME => "SC_SET_NICKNAME",
        SC_ENTER_FIELD => "SC_ENTER_FIELD",
        SC_LEAVE_FIELD => "SC_LEAVE_FIELD",
        SC_MOVE_OBJECT => "SC_MOVE_OBJECT",
        SC_USE_SKILL => "SC_USE_SKILL",
        SC_PING => "SC_PING",
        _ => "UNKNOWN",
    }
}

/// Returns true for opcodes the client sends to the server.
pub fn is_client_opcode(opcode: u16) -> bool {
    (1..=99).contains(&opcode)
}

/// Returns true for opcodes the server sends to the client.
pub fn is_server_opcode(opcode: u16) -> bool {
    (101..=199).contains(&opcode)
}
