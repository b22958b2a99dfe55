//! # beam-server
//!
//! The ingress adapter: an Axum server exposing
//! - `GET /ws`: WebSocket transport for `share-text` / `file-upload` and all
//!   outbound broadcasts
//! - `POST /upload`: multipart file upload bridged into a broadcast
//! - `GET /health` and `GET /metrics`

#![deny(unsafe_code)]

pub mod admission;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod upload;
pub mod websocket;

pub use config::ServerConfig;
pub use server::BeamServer;
