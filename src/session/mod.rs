//! Per-connection read/write cycle.
//!
//! Each connection runs three cooperating pieces: the reader (in the calling
//! task), a writer task that is the only thing touching the sink, and a
//! heartbeat task. Whichever stops first ends the session, after which the
//! connection's room binding is released.

use crate::codec;
use crate::connection::{ConnectionHandle, Outbound, SinkAdapter, StreamAdapter};
use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::SessionError;
use crate::registry::SessionRegistry;
use crate::response::Response;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::{interval, MissedTickBehavior};

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Shared services every connection loop needs.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub ping_interval: Duration,
}

impl SessionContext {
    pub fn new(registry: Arc<SessionRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        SessionContext {
            registry,
            dispatcher,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    pub fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }
}

/// Serves one connection until it closes or fails.
///
/// Returns `Ok(())` on a clean close by the peer and the terminal error
/// otherwise. Either way the connection is no longer bound to any room when
/// this returns.
pub async fn run<St, Si>(stream: St, sink: Si, ctx: SessionContext) -> Result<(), SessionError>
where
    St: StreamAdapter,
    Si: SinkAdapter + 'static,
{
    let (connection, outbound) = ConnectionHandle::new();
    run_with_handle(stream, sink, connection, outbound, ctx).await
}

/// Like [`run`], for callers that created the connection handle themselves.
pub async fn run_with_handle<St, Si>(
    mut stream: St,
    sink: Si,
    connection: ConnectionHandle,
    outbound: Receiver<Outbound>,
    ctx: SessionContext,
) -> Result<(), SessionError>
where
    St: StreamAdapter,
    Si: SinkAdapter + 'static,
{
    let connection_id = connection.id();
    tracing::info!(connection = %connection_id, "client connected");

    let mut writer = tokio::spawn(write_loop(sink, outbound));
    let mut heartbeat = tokio::spawn(heartbeat(connection.clone(), ctx.ping_interval));
    let handler_ctx = HandlerContext::new(ctx.registry.clone(), connection);

    let outcome = tokio::select! {
        read = read_loop(&mut stream, &handler_ctx, &ctx.dispatcher) => read,
        written = &mut writer => flatten(written),
        pinged = &mut heartbeat => flatten(pinged),
    };

    heartbeat.abort();
    if let Some(binding) = ctx.registry.release(connection_id).await {
        tracing::info!(connection = %connection_id, room = %binding.room_id, user_id = %binding.user_id, "released client binding");
    }
    writer.abort();

    match &outcome {
        Ok(()) => tracing::info!(connection = %connection_id, "client disconnected"),
        Err(e) => tracing::warn!(connection = %connection_id, error = %e, "client connection terminated"),
    }
    outcome
}

async fn read_loop<St: StreamAdapter>(
    stream: &mut St,
    ctx: &HandlerContext,
    dispatcher: &Dispatcher,
) -> Result<(), SessionError> {
    loop {
        let Some(frame) = stream.next_frame().await? else {
            return Ok(());
        };

        let message = match codec::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(connection = %ctx.connection.id(), error = %e, "error parsing message from client");
                return Err(e);
            }
        };
        tracing::debug!(connection = %ctx.connection.id(), kind = %message.kind, "received message");

        let response = match dispatcher.dispatch(&message, ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(connection = %ctx.connection.id(), kind = %message.kind, error = %e, "error handling message from client");
                Response::from(&e)
            }
        };
        ctx.connection.send(response)?;
    }
}

async fn write_loop<Si: SinkAdapter>(
    mut sink: Si,
    mut outbound: Receiver<Outbound>,
) -> Result<(), SessionError> {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Response(response) => match codec::encode(&response) {
                Ok(frame) => sink.send_frame(frame).await?,
                Err(e) => tracing::error!(error = %e, "error encoding response"),
            },
            Outbound::Ping => sink.send_ping().await?,
        }
    }
    Ok(())
}

async fn heartbeat(connection: ConnectionHandle, period: Duration) -> Result<(), SessionError> {
    // first tick is immediate: the peer gets a ping right after connecting
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        connection.ping()?;
        tracing::trace!(connection = %connection.id(), "queued ping");
    }
}

fn flatten(
    joined: Result<Result<(), SessionError>, tokio::task::JoinError>,
) -> Result<(), SessionError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(SessionError::Transport(format!("connection task failed: {}", e))),
    }
}
