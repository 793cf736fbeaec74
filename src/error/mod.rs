//! Error taxonomy shared by the registry, rooms, dispatcher and connection loop.

use crate::response::StatusCode;
use crate::room::RoomStatus;
use thiserror::Error;

/// Everything that can go wrong while serving a connection.
///
/// Only [`SessionError::Decode`] and [`SessionError::Transport`] end a
/// connection; every other variant is reported back to the client as a
/// structured response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("game room {0} does not exist")]
    RoomNotFound(String),

    #[error("game room {0} already exists")]
    RoomCollision(String),

    #[error("client is not part of game room {0}")]
    ClientNotFound(String),

    #[error("client is already part of game room {0}")]
    AlreadyInRoom(String),

    #[error("unknown message type {0}")]
    UnknownMessageType(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: RoomStatus, to: RoomStatus },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("a handler is already registered for message type {0}")]
    DuplicateHandler(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Status code reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::RoomNotFound(_) => StatusCode::RoomNotFound,
            SessionError::RoomCollision(_) => StatusCode::RoomCollision,
            SessionError::ClientNotFound(_) => StatusCode::ClientNotFound,
            SessionError::AlreadyInRoom(_) => StatusCode::AlreadyInRoom,
            SessionError::UnknownMessageType(_) => StatusCode::UnknownMessageType,
            SessionError::InvalidStatusTransition { .. } => StatusCode::InvalidStatusTransition,
            SessionError::InvalidMessage(_) | SessionError::Decode(_) => {
                StatusCode::InvalidMessage
            }
            SessionError::DuplicateHandler(_)
            | SessionError::Handler(_)
            | SessionError::Transport(_) => StatusCode::Error,
        }
    }

    /// Whether the error must tear down the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Decode(_) | SessionError::Transport(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Decode(e.to_string())
    }
}

impl From<axum::Error> for SessionError {
    fn from(e: axum::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}
