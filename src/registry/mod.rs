//! The session registry: the single authority over which rooms exist and
//! which room each connection is bound to.
//!
//! Lock order is always registry lock, then room lock. Room-level work that
//! does not need the room table (joining, leaving) releases the registry lock
//! before taking the room lock, so unrelated rooms never wait on each other.
mod test;

use crate::client::ClientBinding;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::SessionError;
use crate::response::Response;
use crate::room::{Room, RoomStatus};
use crate::utils::types::IdGenerator;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<String, Arc<Room>>,
    /// Which room each bound connection belongs to. At most one per connection.
    members: HashMap<ConnectionId, String>,
}

/// Per-room line of a health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub clients: usize,
    pub status: RoomStatus,
    pub room: String,
}

/// Point-in-time view of every room, as served by the health route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    pub games: usize,
    pub game_states: HashMap<String, GameState>,
}

/// Owns every room. Create one per server (or per test) and share it behind
/// an `Arc`.
#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
    room_ids: IdGenerator,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `room_ids` instead of random UUIDs for new rooms.
    pub fn with_id_generator(room_ids: IdGenerator) -> Self {
        SessionRegistry {
            state: Mutex::new(RegistryState::default()),
            room_ids,
        }
    }

    /// Creates a room with `connection` as its first member.
    ///
    /// Returns the room and the creator's user id.
    pub async fn create_room(
        &self,
        connection: &ConnectionHandle,
    ) -> Result<(Arc<Room>, String), SessionError> {
        let mut registry = self.state.lock().await;

        if let Some(current) = registry.members.get(&connection.id()) {
            return Err(SessionError::AlreadyInRoom(current.clone()));
        }

        let room_id = self.room_ids.next_id();
        if registry.rooms.contains_key(&room_id) {
            tracing::error!(room = %room_id, "generated room id collides with a live room");
            return Err(SessionError::RoomCollision(room_id));
        }

        let room = Arc::new(Room::new(room_id.clone()));
        let binding = {
            // nobody else can see the room yet
            let mut state = room.lock().await;
            room.insert_locked(&mut state, connection)?
        };

        registry.rooms.insert(room_id.clone(), room.clone());
        registry.members.insert(connection.id(), room_id.clone());
        tracing::info!(room = %room_id, connection = %connection.id(), rooms = registry.rooms.len(), "created game room");

        Ok((room, binding.user_id))
    }

    /// Binds `connection` to an existing room.
    pub async fn join_room(
        &self,
        connection: &ConnectionHandle,
        room_id: &str,
    ) -> Result<(Arc<Room>, String), SessionError> {
        let room = {
            let mut registry = self.state.lock().await;
            if let Some(current) = registry.members.get(&connection.id()) {
                return Err(SessionError::AlreadyInRoom(current.clone()));
            }
            let room = registry
                .rooms
                .get(room_id)
                .cloned()
                .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;
            registry
                .members
                .insert(connection.id(), room_id.to_string());
            room
        };

        match room.add_client(connection).await {
            Ok(binding) => Ok((room, binding.user_id)),
            Err(e) => {
                // undo the reservation taken above
                let mut registry = self.state.lock().await;
                if registry.members.get(&connection.id()).map(String::as_str) == Some(room_id) {
                    registry.members.remove(&connection.id());
                }
                tracing::warn!(room = %room_id, connection = %connection.id(), error = %e, "failed to join game room");
                Err(e)
            }
        }
    }

    /// Unbinds `connection` from `room_id`. The room stays registered even
    /// when it becomes empty; see [`SessionRegistry::reap_empty_rooms`].
    ///
    /// The member index entry is only cleared once the binding is gone, so a
    /// leave dropped while waiting for the room lock changes nothing and
    /// [`SessionRegistry::release`] can still finish it.
    pub async fn leave_room(
        &self,
        connection: ConnectionId,
        room_id: &str,
    ) -> Result<ClientBinding, SessionError> {
        let room = {
            let mut registry = self.state.lock().await;
            let bound_here = registry.members.get(&connection).map(String::as_str) == Some(room_id);
            let Some(room) = registry.rooms.get(room_id).cloned() else {
                // the room was reaped under a stale reservation
                if bound_here {
                    registry.members.remove(&connection);
                }
                return Err(SessionError::RoomNotFound(room_id.to_string()));
            };
            if !bound_here {
                return Err(SessionError::ClientNotFound(room_id.to_string()));
            }
            room
        };

        // A missing binding still clears the index: it is left behind by a
        // join or leave that was dropped halfway.
        let removed = room.remove_client(connection).await;

        let mut registry = self.state.lock().await;
        if registry.members.get(&connection).map(String::as_str) == Some(room_id) {
            registry.members.remove(&connection);
        }
        removed
    }

    /// Implicit leave for a connection that went away. Tells the remaining
    /// members who left. Returns `None` if the connection was not bound.
    pub async fn release(&self, connection: ConnectionId) -> Option<ClientBinding> {
        let room_id = {
            let registry = self.state.lock().await;
            registry.members.get(&connection).cloned()?
        };

        match self.leave_room(connection, &room_id).await {
            Ok(binding) => {
                if let Some(room) = self.room(&room_id).await {
                    let notice = Response::success(format!(
                        "Client {} left game {}",
                        binding.user_id, room_id
                    ))
                    .with_content(json!({ "room": &room_id, "userId": &binding.user_id }));
                    room.broadcast(&notice).await;
                }
                Some(binding)
            }
            Err(e) => {
                tracing::warn!(room = %room_id, connection = %connection, error = %e, "failed to release client binding");
                None
            }
        }
    }

    pub async fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.state.lock().await.rooms.get(room_id).cloned()
    }

    /// The room `connection` is currently bound to.
    pub async fn room_of(&self, connection: ConnectionId) -> Option<String> {
        self.state.lock().await.members.get(&connection).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }

    /// Snapshot of every room. Holds the registry lock throughout so no
    /// half-inserted or half-removed room is observed.
    pub async fn service_health(&self) -> ServiceState {
        let registry = self.state.lock().await;

        let mut game_states = HashMap::with_capacity(registry.rooms.len());
        for (room_id, room) in registry.rooms.iter() {
            let state = room.lock().await;
            game_states.insert(
                room_id.clone(),
                GameState {
                    clients: state.clients.len(),
                    status: state.status,
                    room: room_id.clone(),
                },
            );
        }

        ServiceState {
            games: registry.rooms.len(),
            game_states,
        }
    }

    /// Drops every room that has been empty for at least `grace`.
    pub async fn reap_empty_rooms(&self, grace: Duration) -> Vec<String> {
        let mut registry = self.state.lock().await;

        let mut reaped = Vec::new();
        for (room_id, room) in registry.rooms.iter() {
            let mut state = room.lock().await;
            if Room::expired_locked(&state, grace) {
                state.closed = true;
                reaped.push(room_id.clone());
            }
        }

        for room_id in &reaped {
            registry.rooms.remove(room_id);
            tracing::info!(room = %room_id, "deleted game room, no players remaining");
        }
        reaped
    }
}

/// Periodically reaps rooms that have stayed empty for `grace`.
pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reaped = registry.reap_empty_rooms(grace).await;
            if !reaped.is_empty() {
                tracing::info!(removed = reaped.len(), "empty room cleanup");
            }
        }
    })
}
