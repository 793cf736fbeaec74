
use crate::error::SessionError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug, Display};

/// Numeric status attached to every response.
///
/// Serialized as its bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum StatusCode {
    Success,
    Processing,
    InvalidMessage,
    UnknownMessageType,
    RoomCollision,
    RoomNotFound,
    ClientNotFound,
    AlreadyInRoom,
    InvalidStatusTransition,
    Error,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Success => 200,
            StatusCode::Processing => 201,
            StatusCode::InvalidMessage => 400,
            StatusCode::UnknownMessageType => 404,
            StatusCode::RoomCollision => 409,
            StatusCode::RoomNotFound => 440,
            StatusCode::ClientNotFound => 441,
            StatusCode::AlreadyInRoom => 442,
            StatusCode::InvalidStatusTransition => 443,
            StatusCode::Error => 500,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Success | StatusCode::Processing)
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status.code()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, String> {
        let status = match code {
            200 => StatusCode::Success,
            201 => StatusCode::Processing,
            400 => StatusCode::InvalidMessage,
            404 => StatusCode::UnknownMessageType,
            409 => StatusCode::RoomCollision,
            440 => StatusCode::RoomNotFound,
            441 => StatusCode::ClientNotFound,
            442 => StatusCode::AlreadyInRoom,
            443 => StatusCode::InvalidStatusTransition,
            500 => StatusCode::Error,
            other => return Err(format!("unknown status code {}", other)),
        };
        Ok(status)
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A structured reply written back to a client, or fanned out to a room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    pub message: String,
    #[serde(default)]
    pub content: Option<Value>,
}

const RESPONSE_STR: &str = "response";
const STATUS_STR: &str = "status";
const MESSAGE_STR: &str = "message";
const CONTENT_STR: &str = "content";

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let mut s = serializer.serialize_struct(RESPONSE_STR, 3)?;
        s.serialize_field(STATUS_STR, &self.status)?;
        s.serialize_field(MESSAGE_STR, &self.message)?;
        s.serialize_field(CONTENT_STR, &self.content)?;
        s.end()
    }
}

impl Response {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Response {
            status,
            message: message.into(),
            content: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Response::new(StatusCode::Success, message)
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn unknown_message_type(tag: &str) -> Self {
        Response::new(
            StatusCode::UnknownMessageType,
            format!("Unknown message type {}", tag),
        )
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Response::new(StatusCode::Error, message)
    }
}

impl From<&SessionError> for Response {
    fn from(e: &SessionError) -> Self {
        Response::new(e.status_code(), e.to_string())
    }
}

impl From<SessionError> for Response {
    fn from(e: SessionError) -> Self {
        Response::from(&e)
    }
}
