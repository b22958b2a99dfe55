//! Per-client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use beam_core::errors::DeliveryError;
use beam_core::ids::{ConnectionId, ShortId};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a connection.
///
/// `Connecting -> Open -> Closed`. Nothing leaves `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created but not yet registered.
    Connecting,
    /// Registered and receiving broadcasts.
    Open,
    /// Removed from the registry; sends fail with [`DeliveryError::Closed`].
    Closed,
}

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// One live client.
///
/// Outbound frames go through a bounded channel drained by the client's
/// socket writer. Sending never blocks: a saturated queue drops the frame and
/// bumps the drop counter.
pub struct Connection {
    id: ConnectionId,
    short_id: ShortId,
    tx: mpsc::Sender<Arc<str>>,
    connected_at: Instant,
    state: AtomicU8,
    /// Cancelled when the relay closes or evicts this connection.
    closed: CancellationToken,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped_frames: AtomicU64,
    /// Held for the whole stamp-and-deliver of a submission from this client.
    submit_lock: Mutex<()>,
}

impl Connection {
    /// Create a connection in the `Connecting` state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            short_id: ShortId::of(&id),
            id,
            tx,
            connected_at: now,
            state: AtomicU8::new(CONNECTING),
            closed: CancellationToken::new(),
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
            submit_lock: Mutex::new(()),
        }
    }

    /// Create a connection with a fresh id and its receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(ConnectionId::new(), tx), rx)
    }

    /// Full connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// 8-character sender attribution.
    pub fn short_id(&self) -> &ShortId {
        &self.short_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::Acquire) {
            CONNECTING => ConnectionState::Connecting,
            OPEN => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    /// Move `Connecting -> Open`. Returns `false` from any other state.
    pub(crate) fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(CONNECTING, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `Closed` and wake anything waiting on [`Connection::closed`].
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn close(&self) -> bool {
        let was_closed = self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED;
        self.closed.cancel();
        !was_closed
    }

    /// Resolves once the relay has closed or evicted this connection.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Enqueue a frame without blocking.
    pub fn send(&self, frame: Arc<str>) -> Result<(), DeliveryError> {
        if self.state() == ConnectionState::Closed {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub(crate) fn lock_submissions(&self) -> MutexGuard<'_, ()> {
        self.submit_lock.lock()
    }

    /// Record inbound activity (pong or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the client showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("dropped_frames", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn new_connection_is_connecting() {
        let (conn, _rx) = Connection::channel(4);
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.short_id().as_str().len(), 8);
        assert!(conn.id().as_str().starts_with(conn.short_id().as_str()));
    }

    #[test]
    fn lifecycle_is_one_way() {
        let (conn, _rx) = Connection::channel(4);
        assert!(conn.mark_open());
        assert!(!conn.mark_open());
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(conn.close());
        assert!(!conn.close());
        assert!(!conn.mark_open());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn send_delivers_in_order() {
        let (conn, mut rx) = Connection::channel(4);
        conn.send(frame("a")).unwrap();
        conn.send(frame("b")).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "a");
        assert_eq!(&*rx.recv().await.unwrap(), "b");
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (conn, _rx) = Connection::channel(1);
        conn.send(frame("first")).unwrap();
        assert_eq!(conn.send(frame("second")), Err(DeliveryError::Full));
        assert_eq!(conn.send(frame("third")), Err(DeliveryError::Full));
        assert_eq!(conn.drop_count(), 2);
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (conn, rx) = Connection::channel(4);
        drop(rx);
        assert_eq!(conn.send(frame("x")), Err(DeliveryError::Closed));
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn closed_connection_rejects_sends() {
        let (conn, _rx) = Connection::channel(4);
        let _ = conn.close();
        assert_eq!(conn.send(frame("x")), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn closed_future_resolves_after_close() {
        let (conn, _rx) = Connection::channel(4);
        let conn = Arc::new(conn);
        let waiter = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.closed().await })
        };
        let _ = conn.close();
        waiter.await.unwrap();
    }

    #[test]
    fn check_alive_resets() {
        let (conn, _rx) = Connection::channel(4);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn mark_alive_resets_silence() {
        let (conn, _rx) = Connection::channel(4);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.last_seen_elapsed() >= Duration::from_millis(20));
        conn.mark_alive();
        assert!(conn.last_seen_elapsed() < Duration::from_millis(20));
    }
}
