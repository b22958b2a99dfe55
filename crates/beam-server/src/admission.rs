//! WebSocket admission against `max_connections`.
//!
//! The cap is checked before the HTTP upgrade but the relay only counts a
//! client once the upgraded socket is registered. Accepted upgrades hold an
//! [`AdmissionSlot`] across that gap so concurrent handshakes cannot overshoot.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upgrades accepted but not yet registered with the relay.
#[derive(Debug, Default)]
pub struct PendingUpgrades {
    pending: AtomicUsize,
}

impl PendingUpgrades {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot if `registered` plus in-flight upgrades stay under `max`.
    pub fn reserve(self: &Arc<Self>, registered: usize, max: usize) -> Option<AdmissionSlot> {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            if registered.saturating_add(current) >= max {
                return None;
            }
            match self.pending.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(AdmissionSlot {
                        pending: Arc::clone(self),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Number of slots currently held.
    pub fn count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// A reserved place under the connection cap.
///
/// Drop it once the connection is registered with the relay, or when the
/// upgrade is abandoned.
#[derive(Debug)]
#[must_use = "dropping the slot releases the reservation"]
pub struct AdmissionSlot {
    pending: Arc<PendingUpgrades>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        let _ = self.pending.pending.fetch_sub(1, Ordering::AcqRel);
    }
}
