//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use beam_relay::{Connection, Relay};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::histogram;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::handler::handle_frame;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::metrics::SESSION_DURATION_SECONDS;

/// Time allowed for the writer to flush a close frame once the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Liveness timing for one session.
#[derive(Clone, Copy, Debug)]
pub struct SessionTiming {
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Silence after which the client is closed.
    pub heartbeat_timeout: Duration,
}

/// Run a WebSocket session for a connection the relay has just opened.
///
/// 1. Forwards the connection's outbound queue (handshake first) to the socket
///    and pings on every heartbeat interval
/// 2. Dispatches inbound text frames to the relay; rejections go back to this
///    client only
/// 3. Ends on client close, heartbeat timeout, eviction, or server shutdown
/// 4. Deregisters the connection on the way out
#[instrument(skip_all, fields(conn_id = %connection.id()))]
pub async fn run_ws_session(
    ws: WebSocket,
    relay: Arc<Relay>,
    connection: Arc<Connection>,
    outbound: mpsc::Receiver<Arc<str>>,
    timing: SessionTiming,
    shutdown: CancellationToken,
) {
    let started = Instant::now();
    let (ws_tx, mut ws_rx) = ws.split();

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        outbound,
        Arc::clone(&connection),
        timing.heartbeat_interval,
    ));
    let heartbeat = run_heartbeat(
        Arc::clone(&connection),
        timing.heartbeat_interval,
        timing.heartbeat_timeout,
        shutdown.child_token(),
    );
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(msg) = msg else {
                    debug!("client stream ended");
                    break;
                };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(error = %e, "client stream error");
                        break;
                    }
                };
                connection.mark_alive();
                let text = match msg {
                    Message::Text(ref t) => Some(t.as_str()),
                    Message::Binary(ref data) => {
                        let text = std::str::from_utf8(data).ok();
                        if text.is_none() {
                            debug!(len = data.len(), "received non-UTF8 binary frame");
                        }
                        text
                    }
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => None,
                };
                let Some(text) = text else { continue };

                if let Some(reply) = handle_frame(&relay, &connection, text) {
                    match reply.to_frame() {
                        Ok(frame) => {
                            if connection.send(Arc::from(frame)).is_err() {
                                debug!("failed to enqueue error reply");
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to serialize error reply"),
                    }
                }
            }
            result = &mut heartbeat => {
                match result {
                    HeartbeatResult::TimedOut => warn!(
                        timeout_secs = timing.heartbeat_timeout.as_secs(),
                        silent_secs = connection.last_seen_elapsed().as_secs(),
                        "client unresponsive, disconnecting"
                    ),
                    HeartbeatResult::Cancelled => info!("server shutting down, closing session"),
                }
                break;
            }
            () = connection.closed() => {
                info!(dropped = connection.drop_count(), "connection evicted by relay");
                break;
            }
        }
    }

    let _ = relay.close(connection.id());
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    histogram!(SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

/// Forward queued frames to the socket and ping on every interval.
///
/// Ends when the connection is closed or the socket rejects a write; a
/// close frame is attempted on the way out.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    connection: Arc<Connection>,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            biased;
            () = connection.closed() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::text(&*frame)).await.is_err() {
                    return;
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    return;
                }
            }
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}
