use crate::use_cases::{Audience, GameEvent};
use axum::extract::ws::Utf8Bytes;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// One serialized server frame plus the connections it is meant for.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub audience: Audience,
    pub frame: Utf8Bytes,
}

#[derive(Clone)]
pub struct AppState {
    // Client events flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Serialized world events, shared across all connections.
    pub outbound_tx: broadcast::Sender<Outbound>,
    // Connections that send no `join` within this window are closed.
    pub join_timeout: Duration,
}
