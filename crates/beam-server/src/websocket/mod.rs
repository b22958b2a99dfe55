//! WebSocket transport: session lifecycle, heartbeat, and inbound dispatch.

pub mod handler;
pub mod heartbeat;
pub mod session;
