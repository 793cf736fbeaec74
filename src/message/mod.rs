
use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt::{self, Display};

/// Tag selecting the handler for a message.
///
/// Any string decodes; whether a handler exists for it is decided by the
/// dispatcher, not by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(Cow<'static, str>);

impl MessageType {
    pub const CREATE_GAME: MessageType = MessageType::from_static("create_game");
    pub const JOIN_GAME: MessageType = MessageType::from_static("join_game");
    pub const LEAVE_GAME: MessageType = MessageType::from_static("leave_game");
    pub const START_GAME: MessageType = MessageType::from_static("start_game");
    pub const END_GAME: MessageType = MessageType::from_static("end_game");
    pub const TRANSFER_MASTER: MessageType = MessageType::from_static("transfer_master");
    pub const CONFIGURE_PROMPT_COUNT: MessageType =
        MessageType::from_static("configure_prompt_count");
    pub const USE_SAVED_PROMPT: MessageType = MessageType::from_static("use_saved_prompt");
    pub const WRITE_PROMPT: MessageType = MessageType::from_static("write_prompt");
    pub const RECEIVE_PROMPT: MessageType = MessageType::from_static("receive_prompt");
    pub const PERFORM_PROMPT: MessageType = MessageType::from_static("perform_prompt");
    pub const DRINK_FOR_PROMPT: MessageType = MessageType::from_static("drink_for_prompt");
    pub const CHANGE_PLAYER_NAME: MessageType = MessageType::from_static("change_player_name");

    pub const fn from_static(tag: &'static str) -> Self {
        MessageType(Cow::Borrowed(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        MessageType(Cow::Owned(tag))
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        MessageType(Cow::Owned(tag.to_string()))
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded client message: a type tag plus a free-form content object.
///
/// # examples
///
/// ```rust
/// use fiesta_box::message::{Message, MessageType};
///
/// let message: Message =
///     serde_json::from_str(r#"{"type": "join_game", "content": {"room": "abc"}}"#).unwrap();
///
/// assert_eq!(message.kind, MessageType::JOIN_GAME);
/// assert_eq!(message.content_str("room").unwrap(), "abc");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Message {
            kind,
            content: Map::new(),
        }
    }

    /// Adds a content entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.content.insert(key.to_string(), value.into());
        self
    }

    /// Reads a required string entry from the content.
    pub fn content_str(&self, key: &str) -> Result<&str, SessionError> {
        match self.content.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(SessionError::InvalidMessage(format!(
                "content field {} must be a string",
                key
            ))),
            None => Err(SessionError::InvalidMessage(format!(
                "missing content field {}",
                key
            ))),
        }
    }
}
