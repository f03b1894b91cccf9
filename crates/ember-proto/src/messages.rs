//! Typed messages for the game protocol, one struct per opcode.

use serde::{Deserialize, Serialize};

/// Client login request (`CS_LOG_IN`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    /// Account identifier.
    pub id: String,
    /// Account password.
    pub password: String,
}

/// Server login result (`SC_LOG_IN`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    /// Whether the login succeeded.
    pub result: bool,
    /// Assigned account identifier (0 on failure).
    pub account_id: u64,
    /// Server timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Client nickname change (`CS_SET_NICKNAME`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetNickname {
    /// Desired display name.
    pub nickname: String,
}

/// Server nickname result (`SC_SET_NICKNAME`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetNicknameResult {
    /// Whether the nickname was accepted.
    pub result: bool,
}

/// Client field entry (`CS_ENTER_FIELD`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnterField {
    /// Field to enter.
    pub field_id: u32,
}

/// Server field-entry result (`SC_ENTER_FIELD`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnterFieldResult {
    /// Whether entry succeeded.
    pub result: bool,
    /// The field entered.
    pub field_id: u32,
}

/// Client field leave (`CS_LEAVE_FIELD`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaveField;

/// Server field-leave result (`SC_LEAVE_FIELD`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaveFieldResult {
    /// Whether the leave was processed.
    pub result: bool,
}

/// Client object movement (`CS_MOVE_OBJECT`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveObject {
    /// The object being moved.
    pub object_id: u64,
    /// Target X position.
    pub x: f32,
    /// Target Y position.
    pub y: f32,
    /// Target Z position.
    pub z: f32,
}

/// Server object-movement update (`SC_MOVE_OBJECT`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveObjectUpdate {
    /// The object that moved.
    pub object_id: u64,
    /// New X position.
    pub x: f32,
    /// New Y position.
    pub y: f32,
    /// New Z position.
    pub z: f32,
}

/// Client skill use (`CS_USE_SKILL`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UseSkill {
    /// The skill being used.
    pub skill_id: u32,
    /// The skill's target object.
    pub target_id: u64,
}

/// Server skill-use result (`SC_USE_SKILL`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UseSkillResult {
    /// Whether the skill fired.
    pub result: bool,
    /// The skill that was used.
    pub skill_id: u32,
}

/// Client heartbeat ping (`CS_PING`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ping {
    /// Sender timestamp in milliseconds, echoed back in the pong.
    pub timestamp_ms: u64,
}

/// Server heartbeat pong (`SC_PING`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    /// The timestamp from the ping being answered.
    pub timestamp_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_message, encode_message};

    #[test]
    fn test_login_roundtrip() {
        let msg = LoginRequest {
            id: "player-one".to_string(),
            password: "hunter2".to_string(),
        };
        let bytes = encode_message(&msg).unwrap();
        let back: LoginRequest = decode_message(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_unit_message_has_empty_body() {
        let bytes = encode_message(&LeaveField).unwrap();
        assert!(bytes.is_empty(), "unit struct serializes to zero bytes");
        let _back: LeaveField = decode_message(&bytes).unwrap();
    }

    #[test]
    fn test_decode_rejects_wrong_schema() {
        let msg = MoveObject {
            object_id: 9,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        };
        let bytes = encode_message(&msg).unwrap();
        let result: Result<LoginRequest, _> = decode_message(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let msg = UseSkill {
            skill_id: 12,
            target_id: 999,
        };
        let bytes = encode_message(&msg).unwrap();
        let result: Result<UseSkill, _> = decode_message(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }
}
