
use crate::connection::{SinkAdapter, StreamAdapter};
use crate::error::SessionError;
use crate::session::{self, SessionContext};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

/// What the server side writes to an in-process client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Text(String),
    Ping,
}

/// An implementation of [`SinkAdapter`] that writes frames to a `tokio::sync::mpsc::Sender`.
pub struct MpscSink {
    sender: Sender<ServerFrame>,
}

#[async_trait]
impl SinkAdapter for MpscSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), SessionError> {
        self.write(ServerFrame::Text(frame)).await
    }

    async fn send_ping(&mut self) -> Result<(), SessionError> {
        self.write(ServerFrame::Ping).await
    }
}

impl MpscSink {
    async fn write(&mut self, frame: ServerFrame) -> Result<(), SessionError> {
        self.sender
            .send(frame)
            .await
            .map_err(|e| SessionError::Transport(format!("failed to send frame: {}", e)))
    }
}

/// An implementation of [`StreamAdapter`] that reads frames from a `tokio::sync::mpsc::Receiver`.
/// A closed channel reads as a clean close.
pub struct MpscStream {
    receiver: Receiver<Vec<u8>>,
}

#[async_trait]
impl StreamAdapter for MpscStream {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.receiver.recv().await)
    }
}

/// Client end of an in-process connection.
pub struct MpscConnection {
    /// Raw inbound frames for the server. Drop it to close the connection.
    pub sender: Sender<Vec<u8>>,
    /// Frames written by the server. Drop it to make the server's writes fail.
    pub receiver: Receiver<ServerFrame>,
    /// The connection loop serving this client.
    pub session: JoinHandle<Result<(), SessionError>>,
}

/// Connects clients to a session context without any networking.
pub struct MpscTransport {
    ctx: SessionContext,
}

impl MpscTransport {
    pub fn new(ctx: SessionContext) -> Self {
        MpscTransport { ctx }
    }

    /// Spawns a connection loop wired to a fresh pair of channels with
    /// `buffer_size` slots each.
    pub fn connect(&self, buffer_size: usize) -> MpscConnection {
        let (frame_tx, frame_rx) = mpsc::channel(buffer_size);
        let (out_tx, out_rx) = mpsc::channel(buffer_size);

        let stream = MpscStream { receiver: frame_rx };
        let sink = MpscSink { sender: out_tx };
        let session = tokio::spawn(session::run(stream, sink, self.ctx.clone()));

        MpscConnection {
            sender: frame_tx,
            receiver: out_rx,
            session,
        }
    }
}
