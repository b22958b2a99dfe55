//! # beam-core
//!
//! Shared vocabulary for the beam relay.
//!
//! - **Branded IDs**: `ConnectionId`, `EnvelopeId`, and the display-only `ShortId`
//! - **Payload codec**: base64 transport encoding for file bytes
//! - **Envelopes**: the immutable `TextEnvelope` / `FileEnvelope` union and the
//!   `Stamper` that validates and stamps them
//! - **Wire frames**: `ClientEvent` / `ServerEvent` JSON frames
//! - **Errors**: `RelayError`, `DeliveryError` via `thiserror`
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod wire;

pub use envelope::{Envelope, EnvelopeKind, EnvelopeLimits, FileEnvelope, Stamper, TextEnvelope};
pub use errors::{DeliveryError, RelayError, Result};
pub use ids::{ConnectionId, EnvelopeId, ShortId};
