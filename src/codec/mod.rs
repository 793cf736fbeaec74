//! JSON wire codec between transport frames and typed messages.

use crate::error::SessionError;
use crate::message::Message;
use crate::response::Response;

/// Decodes one inbound frame.
pub fn decode(frame: &[u8]) -> Result<Message, SessionError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Encodes one outbound response as a text frame.
pub fn encode(response: &Response) -> Result<String, SessionError> {
    serde_json::to_string(response).map_err(|e| SessionError::Handler(e.to_string()))
}
