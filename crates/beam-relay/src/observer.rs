//! Hooks for counters and events about relay activity.

use beam_core::envelope::Envelope;
use beam_core::errors::{DeliveryError, RelayError};

use crate::connection::Connection;
use crate::relay::DeliveryReport;

/// Receives relay lifecycle and delivery events.
///
/// Every method has a no-op default. Implementations are called inline on the
/// relay's hot path and must not block.
pub trait RelayObserver: Send + Sync {
    /// A connection was registered. `active` includes it.
    fn on_connection_opened(&self, _connection: &Connection, _active: usize) {}

    /// A connection was removed, by disconnect or eviction.
    fn on_connection_closed(&self, _connection: &Connection, _active: usize) {}

    /// One per-target delivery attempt finished.
    fn on_deliver(
        &self,
        _target: &Connection,
        _envelope: &Envelope,
        _outcome: Result<(), DeliveryError>,
    ) {
    }

    /// A fan-out finished.
    fn on_broadcast(&self, _envelope: &Envelope, _report: &DeliveryReport) {}

    /// A submission was rejected before any delivery.
    fn on_rejected(&self, _error: &RelayError) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}
