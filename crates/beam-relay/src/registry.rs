//! The set of open connections.

use std::collections::HashMap;
use std::sync::Arc;

use beam_core::errors::{RelayError, Result};
use beam_core::ids::ConnectionId;
use parking_lot::RwLock;

use crate::connection::Connection;

struct Entry {
    seq: u64,
    connection: Arc<Connection>,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    connections: HashMap<ConnectionId, Entry>,
}

/// Authoritative registry of open connections.
///
/// Mutations and snapshots are serialized by one lock; a broadcast iterates
/// over a snapshot taken under that lock and never holds it while sending.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Fails if its id is already present.
    pub fn register(&self, connection: Arc<Connection>) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.connections.contains_key(connection.id()) {
            return Err(RelayError::DuplicateConnection(connection.id().clone()));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let _ = inner
            .connections
            .insert(connection.id().clone(), Entry { seq, connection });
        Ok(())
    }

    /// Remove a connection. Absent ids are a no-op returning `None`.
    pub fn deregister(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.inner.write().connections.remove(id).map(|e| e.connection)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.read().connections.contains_key(id)
    }

    /// Point-in-time copy of the membership, in join order.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        let inner = self.inner.read();
        let mut entries: Vec<&Entry> = inner.connections.values().collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| Arc::clone(&e.connection)).collect()
    }

    /// Number of registered connections.
    pub fn count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
