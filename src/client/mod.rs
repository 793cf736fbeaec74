//! This module defines the `ClientBinding` struct, which ties one connection to one room.
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::utils::generate_id;

/// A connection's membership in a room.
///
/// A binding is never moved between rooms: leaving and rejoining produces a
/// new binding with a new `user_id`.
#[derive(Debug, Clone)]
pub struct ClientBinding {
    pub room_id: String,
    pub connection: ConnectionHandle,
    pub user_id: String,
    pub connected: bool,
}

impl ClientBinding {
    /// Creates a live binding with a freshly generated user id.
    pub fn new(room_id: String, connection: ConnectionHandle) -> Self {
        ClientBinding {
            room_id,
            connection,
            user_id: generate_id(),
            connected: true,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }
}
