// Network adapter for client WebSocket connections.

pub mod client;

pub use client::{dispatch_serializer, ws_handler};
