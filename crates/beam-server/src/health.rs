//! `GET /health`: liveness plus relay occupancy.

use std::time::Instant;

use serde::Serialize;

/// Relay status as seen by a load balancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting new connections.
    Ok,
    /// Shutdown has begun; new sockets are refused.
    Draining,
}

/// Health check response body.
#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` or `"draining"`.
    pub status: HealthStatus,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Currently registered relay connections.
    pub connections: usize,
    /// Admission ceiling for `/ws`.
    pub max_connections: usize,
}

impl HealthResponse {
    /// Whether a new socket would currently be admitted.
    pub fn has_capacity(&self) -> bool {
        self.status == HealthStatus::Ok && self.connections < self.max_connections
    }
}

/// Snapshot the relay's health.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    max_connections: usize,
    draining: bool,
) -> HealthResponse {
    HealthResponse {
        status: if draining {
            HealthStatus::Draining
        } else {
            HealthStatus::Ok
        },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        max_connections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_server_is_ok() {
        let resp = health_check(Instant::now(), 0, 10, false);
        assert_eq!(resp.status, HealthStatus::Ok);
        assert!(resp.uptime_secs < 2);
        assert!(resp.has_capacity());
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        assert!(health_check(start, 0, 10, false).uptime_secs >= 59);
    }

    #[test]
    fn full_or_draining_has_no_capacity() {
        assert!(!health_check(Instant::now(), 10, 10, false).has_capacity());
        assert!(!health_check(Instant::now(), 0, 10, true).has_capacity());
    }

    #[test]
    fn serializes_lowercase_status() {
        let value = serde_json::to_value(health_check(Instant::now(), 2, 8, true)).unwrap();
        assert_eq!(value["status"], "draining");
        assert_eq!(value["connections"], 2);
        assert_eq!(value["max_connections"], 8);
    }
}
