//! The broadcast relay.
//!
//! A submission is validated and stamped into an [`Envelope`], serialized to
//! one `text-shared`/`file-shared` frame, and offered to every connection in a
//! registry snapshot, origin included. Offers never block: a saturated queue
//! drops that frame for that target only and is recorded in the
//! [`DeliveryReport`]. Targets that keep their queue saturated past the drop
//! limit are evicted.

use std::sync::Arc;

use beam_core::envelope::{Envelope, EnvelopeLimits, Stamper};
use beam_core::errors::{DeliveryError, RelayError, Result};
use beam_core::ids::{ConnectionId, EnvelopeId};
use beam_core::wire::ServerEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, ConnectionState};
use crate::observer::{NoopObserver, RelayObserver};
use crate::registry::ConnectionRegistry;

/// Relay tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Payload ceilings.
    pub limits: EnvelopeLimits,
    /// Outbound frames buffered per connection.
    pub queue_capacity: usize,
    /// Cumulative full-queue drops after which a connection is evicted.
    pub slow_client_drop_limit: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            limits: EnvelopeLimits::default(),
            queue_capacity: 256,
            slow_client_drop_limit: 100,
        }
    }
}

/// One target that did not receive an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// The target.
    pub connection: ConnectionId,
    /// Why.
    pub error: DeliveryError,
}

/// Outcome of one fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    /// The envelope that was delivered.
    pub envelope_id: EnvelopeId,
    /// Targets offered the frame.
    pub attempted: usize,
    /// Targets whose queue accepted the frame.
    pub delivered: usize,
    /// Per-target failures, in attempt order.
    pub failures: Vec<DeliveryFailure>,
    /// Targets evicted for exceeding the drop limit during this fan-out.
    pub evicted: Vec<ConnectionId>,
}

impl DeliveryReport {
    fn new(envelope_id: EnvelopeId) -> Self {
        Self {
            envelope_id,
            attempted: 0,
            delivered: 0,
            failures: Vec::new(),
            evicted: Vec::new(),
        }
    }

    /// Number of failed targets.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every attempted target accepted the frame.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An accepted submission and how its fan-out went.
#[derive(Clone, Debug)]
pub struct Broadcast {
    /// The stamped envelope.
    pub envelope: Envelope,
    /// Delivery outcome.
    pub report: DeliveryReport,
}

/// The broadcast relay. Owns the registry; share it behind an `Arc`.
pub struct Relay {
    registry: ConnectionRegistry,
    stamper: Stamper,
    config: RelayConfig,
    observer: Arc<dyn RelayObserver>,
}

impl Relay {
    /// Create a relay with no observer.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Create a relay reporting to `observer`.
    pub fn with_observer(config: RelayConfig, observer: Arc<dyn RelayObserver>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            stamper: Stamper::new(config.limits),
            config,
            observer,
        }
    }

    /// Relay tuning.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The membership registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Create, greet and register a new connection.
    ///
    /// The returned receiver yields the `connected` handshake first, then
    /// every broadcast taken after registration.
    pub fn open(&self) -> (Arc<Connection>, mpsc::Receiver<Arc<str>>) {
        let (connection, rx) = Connection::channel(self.config.queue_capacity);
        let connection = Arc::new(connection);
        // A fresh id cannot collide; a failure here is already logged.
        let _ = self.attach(&connection);
        (connection, rx)
    }

    /// Greet and register an externally created connection.
    ///
    /// A duplicate id is logged and reported; the existing registration
    /// stays in place.
    pub fn attach(&self, connection: &Arc<Connection>) -> Result<()> {
        if self.registry.contains(connection.id()) {
            return Err(self.duplicate(connection));
        }
        if connection.state() != ConnectionState::Connecting {
            return Err(self.reject(RelayError::validation(format!(
                "connection {} is not connecting",
                connection.id()
            ))));
        }

        // Enqueued before registration so it precedes every broadcast.
        let hello = ServerEvent::Connected {
            id: connection.id().clone(),
            short_id: connection.short_id().clone(),
            peers: self.registry.count() + 1,
        };
        match hello.to_frame() {
            Ok(frame) => {
                let _ = connection.send(Arc::from(frame));
            }
            Err(e) => error!(conn_id = %connection.id(), error = %e, "failed to serialize handshake"),
        }

        if self.registry.register(Arc::clone(connection)).is_err() {
            return Err(self.duplicate(connection));
        }
        let _ = connection.mark_open();
        let active = self.registry.count();
        info!(conn_id = %connection.id(), sender = %connection.short_id(), active, "connection opened");
        self.observer.on_connection_opened(connection, active);
        Ok(())
    }

    /// Deregister and close a connection.
    ///
    /// Returns `false` if it was already gone (disconnect racing an eviction).
    pub fn close(&self, id: &ConnectionId) -> bool {
        let Some(connection) = self.registry.deregister(id) else {
            debug!(conn_id = %id, "close for unregistered connection ignored");
            return false;
        };
        let _ = connection.close();
        let active = self.registry.count();
        info!(
            conn_id = %id,
            active,
            dropped = connection.drop_count(),
            age_secs = connection.age().as_secs(),
            "connection closed"
        );
        self.observer.on_connection_closed(&connection, active);
        true
    }

    // ── Submissions ─────────────────────────────────────────────────

    /// Share a text snippet from `origin` with every open connection.
    pub fn submit_text(&self, origin: &Connection, content: &str) -> Result<Broadcast> {
        let _order = origin.lock_submissions();
        let envelope = self
            .stamper
            .text(content, origin.short_id())
            .map_err(|e| self.reject(e))?;
        Ok(self.broadcast(envelope.into()))
    }

    /// Share raw file bytes arriving without an originating connection.
    pub fn submit_file(&self, raw: &[u8], name: &str, mime_type: &str) -> Result<Broadcast> {
        let envelope = self
            .stamper
            .file(name, mime_type, raw, None)
            .map_err(|e| self.reject(e))?;
        Ok(self.broadcast(envelope.into()))
    }

    /// Re-share a base64 file record sent by `origin`.
    pub fn submit_encoded_file(
        &self,
        origin: &Connection,
        name: &str,
        mime_type: &str,
        data: &str,
    ) -> Result<Broadcast> {
        let _order = origin.lock_submissions();
        let envelope = self
            .stamper
            .file_from_encoded(name, mime_type, data, Some(origin.short_id().clone()))
            .map_err(|e| self.reject(e))?;
        Ok(self.broadcast(envelope.into()))
    }

    // ── Fan-out ─────────────────────────────────────────────────────

    /// Deliver `envelope` to the current membership.
    pub fn broadcast(&self, envelope: Envelope) -> Broadcast {
        let targets = self.registry.snapshot();
        let report = self.deliver(&envelope, &targets);
        info!(
            envelope_id = %envelope.id(),
            kind = envelope.kind().as_str(),
            recipients = report.attempted,
            delivered = report.delivered,
            failed = report.failed(),
            "broadcast"
        );
        self.observer.on_broadcast(&envelope, &report);
        Broadcast { envelope, report }
    }

    /// Offer `envelope` to each of `targets`.
    ///
    /// One failing target never stops the rest. Targets whose drop count
    /// reaches the limit are evicted after the loop.
    pub fn deliver(&self, envelope: &Envelope, targets: &[Arc<Connection>]) -> DeliveryReport {
        let mut report = DeliveryReport::new(envelope.id().clone());
        let frame: Arc<str> = match ServerEvent::from(envelope.clone()).to_frame() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(envelope_id = %envelope.id(), error = %e, "failed to serialize envelope");
                return report;
            }
        };

        for target in targets {
            report.attempted += 1;
            let outcome = target.send(Arc::clone(&frame));
            self.observer.on_deliver(target, envelope, outcome);
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    debug!(
                        conn_id = %target.id(),
                        envelope_id = %envelope.id(),
                        reason = error.reason(),
                        "delivery failed"
                    );
                    if error == DeliveryError::Full
                        && target.drop_count() >= self.config.slow_client_drop_limit
                    {
                        report.evicted.push(target.id().clone());
                    }
                    report.failures.push(DeliveryFailure {
                        connection: target.id().clone(),
                        error,
                    });
                }
            }
        }

        for id in &report.evicted {
            if self.close(id) {
                warn!(
                    conn_id = %id,
                    limit = self.config.slow_client_drop_limit,
                    "evicted slow client"
                );
            }
        }
        report
    }

    fn reject(&self, error: RelayError) -> RelayError {
        debug!(code = error.code(), error = %error, "submission rejected");
        self.observer.on_rejected(&error);
        error
    }

    fn duplicate(&self, connection: &Connection) -> RelayError {
        let error = RelayError::DuplicateConnection(connection.id().clone());
        warn!(conn_id = %connection.id(), "connection already registered");
        self.observer.on_rejected(&error);
        error
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
