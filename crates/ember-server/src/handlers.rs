//! Game message handlers and session lifecycle hooks.
//!
//! Every client opcode gets a typed handler registered at startup. Handlers
//! run on the session's read task: they decode, log, and enqueue a reply,
//! never blocking.

use std::time::{SystemTime, UNIX_EPOCH};

use ember_net::dispatch::DispatchRegistry;
use ember_net::session::{DisconnectReason, SessionHandle, SessionHooks};
use ember_proto::messages::{
    EnterField, EnterFieldResult, LeaveField, LeaveFieldResult, LoginRequest, LoginResponse,
    MoveObject, MoveObjectUpdate, Ping, Pong, SetNickname, SetNicknameResult, UseSkill,
    UseSkillResult,
};
use ember_proto::opcode;
use ember_proto::{SendError, send_message};
use tracing::{info, warn};

/// Placeholder account id until a real account store exists.
const STUB_ACCOUNT_ID: u64 = 1000;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn reply<M: serde::Serialize>(session: &SessionHandle, op: u16, message: &M) {
    if let Err(err) = send_message(session, op, message) {
        match err {
            SendError::Frame(frame_err) => {
                warn!(id = ?session.id(), opcode = op, error = %frame_err, "reply dropped")
            }
            SendError::Encode(enc_err) => {
                warn!(id = ?session.id(), opcode = op, error = %enc_err, "reply failed to encode")
            }
        }
    }
}

fn handle_login(session: &SessionHandle, request: LoginRequest) {
    info!(id = ?session.id(), account = %request.id, "login request");
    // No account database yet; everyone logs in as the stub account.
    reply(
        session,
        opcode::SC_LOG_IN,
        &LoginResponse {
            result: true,
            account_id: STUB_ACCOUNT_ID,
            timestamp_ms: now_ms(),
        },
    );
}

fn handle_set_nickname(session: &SessionHandle, request: SetNickname) {
    info!(id = ?session.id(), nickname = %request.nickname, "set nickname");
    reply(session, opcode::SC_SET_NICKNAME, &SetNicknameResult { result: true });
}

fn handle_enter_field(session: &SessionHandle, request: EnterField) {
    info!(id = ?session.id(), field_id = request.field_id, "enter field");
    reply(
        session,
        opcode::SC_ENTER_FIELD,
        &EnterFieldResult {
            result: true,
            field_id: request.field_id,
        },
    );
}

fn handle_leave_field(session: &SessionHandle, _request: LeaveField) {
    info!(id = ?session.id(), "leave field");
    reply(session, opcode::SC_LEAVE_FIELD, &LeaveFieldResult { result: true });
}

fn handle_move_object(session: &SessionHandle, request: MoveObject) {
    reply(
        session,
        opcode::SC_MOVE_OBJECT,
        &MoveObjectUpdate {
            object_id: request.object_id,
            x: request.x,
            y: request.y,
            z: request.z,
        },
    );
}

fn handle_use_skill(session: &SessionHandle, request: UseSkill) {
    info!(
        id = ?session.id(),
        skill_id = request.skill_id,
        target_id = request.target_id,
        "use skill"
    );
    reply(
        session,
        opcode::SC_USE_SKILL,
        &UseSkillResult {
            result: true,
            skill_id: request.skill_id,
        },
    );
}

fn handle_ping(session: &SessionHandle, request: Ping) {
    reply(
        session,
        opcode::SC_PING,
        &Pong {
            timestamp_ms: request.timestamp_ms,
        },
    );
}

/// Register every client opcode. Called once at startup, before the
/// listener accepts anything.
pub fn register_all(registry: &mut DispatchRegistry) {
    ember_proto::register_message(registry, opcode::CS_LOG_IN, handle_login);
    ember_proto::register_message(registry, opcode::CS_SET_NICKNAME, handle_set_nickname);
    ember_proto::register_message(registry, opcode::CS_ENTER_FIELD, handle_enter_field);
    ember_proto::register_message(registry, opcode::CS_LEAVE_FIELD, handle_leave_field);
    ember_proto::register_message(registry, opcode::CS_MOVE_OBJECT, handle_move_object);
    ember_proto::register_message(registry, opcode::CS_USE_SKILL, handle_use_skill);
    ember_proto::register_message(registry, opcode::CS_PING, handle_ping);
}

/// Lifecycle hooks that log connection churn.
pub struct GameHooks;

impl SessionHooks for GameHooks {
    fn on_connect(&self, session: &SessionHandle) {
        info!(id = ?session.id(), "client connected");
    }

    fn on_disconnect(&self, session: &SessionHandle, reason: &DisconnectReason) {
        match reason {
            DisconnectReason::PeerClosed | DisconnectReason::LocalClose => {
                info!(id = ?session.id(), %reason, "client disconnected");
            }
            _ => {
                warn!(id = ?session.id(), %reason, "client disconnected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ember_net::gateway::ConnectionId;
    use ember_net::session::{NoopHooks, Session};
    use ember_proto::{decode_message, encode_message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    /// Spawn a session over an in-memory duplex with the full handler set
    /// registered, returning the client half of the stream.
    fn spawn_game_session() -> tokio::io::DuplexStream {
        let mut registry = DispatchRegistry::new();
        register_all(&mut registry);

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server);
        let session = Session::new(
            ConnectionId(1),
            read_half,
            write_half,
            Arc::new(registry),
            Arc::new(NoopHooks),
        );
        tokio::spawn(session.run());
        client
    }

    async fn send_frame(client: &mut tokio::io::DuplexStream, op: u16, body: &[u8]) {
        let len = (2 + body.len()) as u16;
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&op.to_le_bytes());
        frame.extend_from_slice(body);
        client.write_all(&frame).await.unwrap();
    }

    async fn read_frame(client: &mut tokio::io::DuplexStream) -> (u16, Vec<u8>) {
        let mut header = [0u8; 2];
        client.read_exact(&mut header).await.unwrap();
        let len = u16::from_le_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        client.read_exact(&mut payload).await.unwrap();
        let op = u16::from_le_bytes([payload[0], payload[1]]);
        (op, payload[2..].to_vec())
    }

    #[tokio::test]
    async fn test_login_replies_with_stub_account() {
        let mut client = spawn_game_session();

        let body = encode_message(&LoginRequest {
            id: "player-one".to_string(),
            password: "hunter2".to_string(),
        })
        .unwrap();
        send_frame(&mut client, opcode::CS_LOG_IN, &body).await;

        let (op, reply_body) = read_frame(&mut client).await;
        assert_eq!(op, opcode::SC_LOG_IN);
        let response: LoginResponse = decode_message(&reply_body).unwrap();
        assert!(response.result);
        assert_eq!(response.account_id, STUB_ACCOUNT_ID);
    }

    #[tokio::test]
    async fn test_ping_echoes_timestamp() {
        let mut client = spawn_game_session();

        let body = encode_message(&Ping { timestamp_ms: 123_456 }).unwrap();
        send_frame(&mut client, opcode::CS_PING, &body).await;

        let (op, reply_body) = read_frame(&mut client).await;
        assert_eq!(op, opcode::SC_PING);
        let pong: Pong = decode_message(&reply_body).unwrap();
        assert_eq!(pong.timestamp_ms, 123_456);
    }

    #[tokio::test]
    async fn test_move_object_broadcasts_update() {
        let mut client = spawn_game_session();

        let body = encode_message(&MoveObject {
            object_id: 42,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        })
        .unwrap();
        send_frame(&mut client, opcode::CS_MOVE_OBJECT, &body).await;

        let (op, reply_body) = read_frame(&mut client).await;
        assert_eq!(op, opcode::SC_MOVE_OBJECT);
        let update: MoveObjectUpdate = decode_message(&reply_body).unwrap();
        assert_eq!(update.object_id, 42);
        assert_eq!(update.y, 2.0);
    }

    #[tokio::test]
    async fn test_every_client_opcode_is_registered() {
        let mut registry = DispatchRegistry::new();
        register_all(&mut registry);

        for op in [
            opcode::CS_LOG_IN,
            opcode::CS_SET_NICKNAME,
            opcode::CS_ENTER_FIELD,
            opcode::CS_LEAVE_FIELD,
            opcode::CS_MOVE_OBJECT,
            opcode::CS_USE_SKILL,
            opcode::CS_PING,
        ] {
            assert!(registry.is_registered(op), "opcode {} not registered", op);
        }
    }
}
