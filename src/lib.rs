//! Session backbone for a realtime party game.
//!
//! Clients connect over a websocket, send `{"type": ..., "content": {...}}`
//! messages, and get JSON responses back. A [`registry::SessionRegistry`]
//! owns the rooms; each connection is served by [`session::run`], which
//! routes messages through a [`dispatcher::Dispatcher`].
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod message;
pub mod registry;
pub mod response;
pub mod room;
pub mod server;
pub mod session;
pub mod transport;
pub mod utils;
