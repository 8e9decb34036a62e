use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// ROOM DOMAIN MODELS
// ==============================================================================

/// Identifies one live signaling socket. Sent to clients as `socket_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
    pub role: Role,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// First occupant; nobody to notify yet.
    Waiting,
    /// Second occupant; `peer` is the participant already in the room.
    Paired { peer: Participant },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub room_code: String,
    pub remaining: Option<Participant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredRoom {
    pub room_code: String,
    pub occupant: Participant,
    pub waiting_since: DateTime<Utc>,
}

// ==============================================================================
// WIRE EVENTS
// ==============================================================================

/// Frames sent by clients: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinRoom { room: String, nickname: Option<String> },
    SendSignal { socket_id: ConnectionId, signal: Value },
    ReSendSignal { socket_id: ConnectionId, signal: Value },
    LeaveRoom,
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct JoinRoomData {
    room: String,
    nickname: Option<String>,
}

#[derive(Deserialize)]
struct SignalData {
    socket_id: ConnectionId,
    signal: Value,
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        let frame: RawFrame = serde_json::from_str(text)
            .map_err(|e| SignalingError::Malformed(format!("invalid frame: {}", e)))?;

        let malformed = |e: serde_json::Error| {
            SignalingError::Malformed(format!("invalid {} payload: {}", frame.event, e))
        };

        match frame.event.as_str() {
            "join-room" => {
                let data: JoinRoomData = serde_json::from_value(frame.data.clone()).map_err(malformed)?;
                if data.room.trim().is_empty() {
                    return Err(SignalingError::Malformed("room must not be empty".to_string()));
                }
                Ok(ClientEvent::JoinRoom { room: data.room, nickname: data.nickname })
            }
            "send-signal" => {
                let data: SignalData = serde_json::from_value(frame.data.clone()).map_err(malformed)?;
                Ok(ClientEvent::SendSignal { socket_id: data.socket_id, signal: data.signal })
            }
            "re-send-signal" => {
                let data: SignalData = serde_json::from_value(frame.data.clone()).map_err(malformed)?;
                Ok(ClientEvent::ReSendSignal { socket_id: data.socket_id, signal: data.signal })
            }
            "leave-room" => Ok(ClientEvent::LeaveRoom),
            other => Err(SignalingError::Malformed(format!("unknown event: {}", other))),
        }
    }
}

/// Frames pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected {
        socket_id: ConnectionId,
    },
    OtherUser {
        socket_id: ConnectionId,
        user_id: Uuid,
        role: Role,
        nickname: Option<String>,
    },
    ReceivingSignal {
        signal: Value,
        sender: ConnectionId,
    },
    ReReceivingSignal {
        signal: Value,
        sender: ConnectionId,
    },
    UserLeave {
        socket_id: ConnectionId,
    },
    RoomExpired {
        room: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn other_user(newcomer: &Participant) -> Self {
        ServerEvent::OtherUser {
            socket_id: newcomer.connection_id,
            user_id: newcomer.user_id,
            role: newcomer.role,
            nickname: newcomer.nickname.clone(),
        }
    }

    pub fn error(err: &SignalingError) -> Self {
        ServerEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Room {0} already has two participants")]
    RoomFull(String),

    #[error("Connection is already in room {0}")]
    AlreadyInRoom(String),

    #[error("Peer {0} is not in your room")]
    UnknownPeer(ConnectionId),

    #[error("denied")]
    AccessDenied,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalingError {
    /// Wire code carried by `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            SignalingError::Malformed(_) => "VALIDATION_ERROR",
            SignalingError::RoomFull(_) | SignalingError::AlreadyInRoom(_) => "CONFLICT",
            SignalingError::UnknownPeer(_) => "NOT_FOUND",
            SignalingError::AccessDenied => "FORBIDDEN",
            SignalingError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AppointmentError> for SignalingError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::DatabaseError(msg) => SignalingError::Internal(msg),
            _ => SignalingError::AccessDenied,
        }
    }
}

impl From<SignalingError> for AppError {
    fn from(err: SignalingError) -> Self {
        match err {
            SignalingError::Malformed(_) => AppError::ValidationError(err.to_string()),
            SignalingError::RoomFull(_) | SignalingError::AlreadyInRoom(_) => AppError::Conflict(err.to_string()),
            SignalingError::UnknownPeer(_) => AppError::NotFound(err.to_string()),
            SignalingError::AccessDenied => AppError::Forbidden(err.to_string()),
            SignalingError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
