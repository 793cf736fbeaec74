//! Transport boundary and the per-connection outbound queue.

use crate::error::SessionError;
use crate::response::Response;
use crate::utils::next_connection_seq;
use async_trait::async_trait;
use std::fmt::{self, Display};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Write half of a transport.
///
/// Only the connection's writer task holds one, so implementations never see
/// concurrent writes.
#[async_trait]
pub trait SinkAdapter: Send {
    /// Writes one encoded response frame.
    async fn send_frame(&mut self, frame: String) -> Result<(), SessionError>;

    /// Writes a keep-alive control frame.
    async fn send_ping(&mut self) -> Result<(), SessionError>;
}

/// Read half of a transport.
#[async_trait]
pub trait StreamAdapter: Send {
    /// Reads the next data frame. `Ok(None)` means the peer closed cleanly.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SessionError>;
}

/// Stable identity of one accepted connection, decoupled from the transport
/// object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn next() -> Self {
        ConnectionId(next_connection_seq())
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Frames a connection may have waiting for its writer before it counts as
/// stalled.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Something queued for the writer task of a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Response(Response),
    Ping,
}

/// Cloneable handle used to route writes to one connection.
///
/// Holders never own the transport; they only enqueue onto it. The queue is
/// bounded: a failed enqueue means the writer has gone away or the peer
/// stopped reading.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: Sender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle with a fresh id and the receiving end of its queue.
    pub fn new() -> (Self, Receiver<Outbound>) {
        Self::with_capacity(ConnectionId::next(), DEFAULT_OUTBOUND_CAPACITY)
    }

    pub fn with_id(id: ConnectionId) -> (Self, Receiver<Outbound>) {
        Self::with_capacity(id, DEFAULT_OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(id: ConnectionId, capacity: usize) -> (Self, Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ConnectionHandle { id, outbound: tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, response: Response) -> Result<(), SessionError> {
        self.enqueue(Outbound::Response(response))
    }

    /// Queues a keep-alive. A full queue already has frames that will prove
    /// liveness, so the ping is skipped rather than failed.
    pub fn ping(&self) -> Result<(), SessionError> {
        match self.outbound.try_send(Outbound::Ping) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(self.closed_error()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    fn enqueue(&self, item: Outbound) -> Result<(), SessionError> {
        self.outbound.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => {
                SessionError::Transport(format!("{} outbound queue full", self.id))
            }
            TrySendError::Closed(_) => self.closed_error(),
        })
    }

    fn closed_error(&self) -> SessionError {
        SessionError::Transport(format!("{} outbound queue closed", self.id))
    }
}
