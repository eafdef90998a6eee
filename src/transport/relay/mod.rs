//! Axum-based HTTP relay between the Discord bot and polling game servers.
//!
//! The relay owns a [`CommandStore`] shared by every handler through
//! [`AppState`]. Routes:
//! - `POST /api/command` queues a command
//! - `GET /api/commands/{serverId}` hands undelivered commands to a game server
//! - `POST /api/result` / `GET /api/result/{commandId}` relay results back
//! - `GET /health` and `GET /` report liveness and store counters

mod handlers;
mod server;
pub mod store;
pub mod types;

pub use server::{build_app, run_relay, run_relay_with_listener};
pub use store::{CommandStore, DEFAULT_COMMAND_TTL, StoreStats, spawn_expiry_sweeper};
pub use types::{
    Command, CommandResult, EnqueueRequest, EnqueueResponse, PendingCommands, ResultSubmission,
    RobloxUserId,
};

use std::sync::Arc;
use std::time::Instant;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CommandStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<CommandStore>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests;
