//! HTTP and WebSocket surface for delver research sessions.

pub mod api;
pub mod metrics;
pub mod state;
