//! Signaling broker UI layer (axum WebSocket + HTTP).

mod handler;
mod liveness;
mod server;
mod signal;
pub mod state; // UseCase 層からアクセスするため public

pub use liveness::DEFAULT_PROBE_INTERVAL;
pub use server::Server;
