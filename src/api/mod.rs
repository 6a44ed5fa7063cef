//! API Layer Module
//!
//! HTTP server, routes, and the WebSocket endpoint.

pub mod addresses;
pub mod server;
pub mod websocket;

// Re-exports for convenience
pub use server::{create_router, start_server, AppState, SharedAppState};
