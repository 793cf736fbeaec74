//! Transport adapters feeding the connection loop.
pub mod axum;
pub mod mpsc;
