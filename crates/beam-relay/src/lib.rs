//! # beam-relay
//!
//! The realtime broadcast core.
//!
//! - [`Connection`]: one live client with a bounded outbound frame queue
//! - [`ConnectionRegistry`]: the authoritative set of open connections
//! - [`Relay`]: validates and stamps submissions, snapshots the registry, and
//!   fans each envelope out to every member without letting one slow target
//!   hold up the rest
//! - [`RelayObserver`]: hook for counters and events about the above

#![deny(unsafe_code)]

pub mod connection;
pub mod observer;
pub mod registry;
pub mod relay;

pub use connection::{Connection, ConnectionState};
pub use observer::{NoopObserver, RelayObserver};
pub use registry::ConnectionRegistry;
pub use relay::{Broadcast, DeliveryFailure, DeliveryReport, Relay, RelayConfig};
