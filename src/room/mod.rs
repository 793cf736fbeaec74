
use crate::client::ClientBinding;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::SessionError;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Lifecycle of one game. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    NotStarted,
    Started,
    Completed,
}

impl RoomStatus {
    /// The only status this one may move to, if any.
    pub fn successor(self) -> Option<RoomStatus> {
        match self {
            RoomStatus::NotStarted => Some(RoomStatus::Started),
            RoomStatus::Started => Some(RoomStatus::Completed),
            RoomStatus::Completed => None,
        }
    }
}

impl Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStatus::NotStarted => "not_started",
            RoomStatus::Started => "started",
            RoomStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub(crate) struct RoomState {
    pub(crate) status: RoomStatus,
    pub(crate) clients: HashMap<ConnectionId, ClientBinding>,
    pub(crate) emptied_at: Option<Instant>,
    /// Set once the registry has dropped this room. Late joiners holding a
    /// stale `Arc<Room>` must treat it as gone.
    pub(crate) closed: bool,
}

/// One game session: its members and its status, behind the room lock.
#[derive(Debug)]
pub struct Room {
    id: String,
    state: Mutex<RoomState>,
}

impl Room {
    pub(crate) fn new(id: String) -> Self {
        Room {
            id,
            state: Mutex::new(RoomState {
                status: RoomStatus::NotStarted,
                clients: HashMap::new(),
                emptied_at: Some(Instant::now()),
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Binds `connection` to this room under a fresh user id.
    pub async fn add_client(
        &self,
        connection: &ConnectionHandle,
    ) -> Result<ClientBinding, SessionError> {
        let mut state = self.lock().await;
        if state.closed {
            return Err(SessionError::RoomNotFound(self.id.clone()));
        }
        self.insert_locked(&mut state, connection)
    }

    pub(crate) fn insert_locked(
        &self,
        state: &mut RoomState,
        connection: &ConnectionHandle,
    ) -> Result<ClientBinding, SessionError> {
        if state.clients.contains_key(&connection.id()) {
            return Err(SessionError::AlreadyInRoom(self.id.clone()));
        }
        let binding = ClientBinding::new(self.id.clone(), connection.clone());
        state.clients.insert(connection.id(), binding.clone());
        state.emptied_at = None;
        tracing::info!(
            room = %self.id,
            user_id = %binding.user_id,
            connection = %connection.id(),
            clients = state.clients.len(),
            "client joined room"
        );
        Ok(binding)
    }

    /// Removes the binding of `connection`, returning it marked disconnected.
    pub async fn remove_client(
        &self,
        connection: ConnectionId,
    ) -> Result<ClientBinding, SessionError> {
        let mut state = self.lock().await;
        let mut binding = state
            .clients
            .remove(&connection)
            .ok_or_else(|| SessionError::ClientNotFound(self.id.clone()))?;
        binding.connected = false;
        if state.clients.is_empty() {
            state.emptied_at = Some(Instant::now());
        }
        tracing::info!(
            room = %self.id,
            user_id = %binding.user_id,
            connection = %connection,
            clients = state.clients.len(),
            "client left room"
        );
        Ok(binding)
    }

    /// Delivers `response` to every bound client. Returns how many were reached.
    pub async fn broadcast(&self, response: &Response) -> usize {
        self.fan_out(response, None).await
    }

    /// Like [`Room::broadcast`] but skips one connection, usually the sender.
    pub async fn broadcast_except(&self, response: &Response, skip: ConnectionId) -> usize {
        self.fan_out(response, Some(skip)).await
    }

    async fn fan_out(&self, response: &Response, skip: Option<ConnectionId>) -> usize {
        // Snapshot, then write with the room lock released.
        let targets: Vec<ConnectionHandle> = {
            let state = self.lock().await;
            state
                .clients
                .values()
                .filter(|b| Some(b.connection_id()) != skip)
                .map(|b| b.connection.clone())
                .collect()
        };

        let mut delivered = 0;
        for target in targets {
            match target.send(response.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(room = %self.id, connection = %target.id(), error = %e, "skipped broadcast target")
                }
            }
        }
        delivered
    }

    pub async fn status(&self) -> RoomStatus {
        self.lock().await.status
    }

    /// Moves the room to `next`. Only the single forward step is accepted.
    pub async fn set_status(&self, next: RoomStatus) -> Result<(), SessionError> {
        let mut state = self.lock().await;
        let current = state.status;
        if current.successor() != Some(next) {
            tracing::warn!(room = %self.id, from = %current, to = %next, "rejected status transition");
            return Err(SessionError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }
        state.status = next;
        tracing::info!(room = %self.id, from = %current, to = %next, "room status changed");
        Ok(())
    }

    pub async fn client_count(&self) -> usize {
        self.lock().await.clients.len()
    }

    pub async fn contains(&self, connection: ConnectionId) -> bool {
        self.lock().await.clients.contains_key(&connection)
    }

    pub async fn binding(&self, connection: ConnectionId) -> Option<ClientBinding> {
        self.lock().await.clients.get(&connection).cloned()
    }

    pub async fn user_ids(&self) -> Vec<String> {
        let state = self.lock().await;
        state.clients.values().map(|b| b.user_id.clone()).collect()
    }

    /// Whether the room has had no members for at least `grace`.
    pub(crate) fn expired_locked(state: &RoomState, grace: Duration) -> bool {
        state.clients.is_empty()
            && state
                .emptied_at
                .is_some_and(|since| since.elapsed() >= grace)
    }
}
