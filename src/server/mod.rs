//! HTTP surface: websocket upgrade plus health routes.

use crate::config::ServerConfig;
use crate::handlers::default_dispatcher;
use crate::registry::{spawn_reaper, ServiceState, SessionRegistry};
use crate::session::{self, SessionContext};
use crate::transport;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Router state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub ctx: SessionContext,
}

impl AppState {
    pub fn new(ctx: SessionContext) -> Self {
        AppState { ctx }
    }

    /// Fresh registry and the default handler table, with the configured ping interval.
    pub fn from_config(config: &ServerConfig) -> Self {
        let ctx = SessionContext::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(default_dispatcher()),
        )
        .with_ping_interval(config.ping_interval());
        AppState { ctx }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.ctx.registry
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/games/health", get(games_health))
        .route("/websocket", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn games_health(State(state): State<AppState>) -> Json<ServiceState> {
    Json(state.registry().service_health().await)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (stream, sink) = transport::axum::split(socket);
        // outcome is logged by the connection loop
        let _ = session::run(stream, sink, state.ctx).await;
    })
}

/// Binds the configured address and serves until ctrl-c.
pub async fn serve(config: ServerConfig) -> io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let state = AppState::from_config(&config);

    let reaper = config.empty_room_grace().map(|grace| {
        tracing::info!(grace = ?grace, interval = ?config.reap_interval(), "empty room reaper enabled");
        spawn_reaper(state.registry().clone(), config.reap_interval(), grace)
    });

    let result = serve_listener(listener, state, shutdown_signal()).await;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    result
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, starting graceful shutdown"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            // without a signal handler, run until the process is killed
            std::future::pending::<()>().await
        }
    }
}
