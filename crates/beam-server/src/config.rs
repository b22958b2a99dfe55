//! Server configuration.

use std::time::Duration;

use beam_core::envelope::{DEFAULT_MAX_FILE_BYTES, EnvelopeLimits};
use beam_relay::RelayConfig;
use beam_settings::BeamSettings;
use serde::{Deserialize, Serialize};

/// Room for multipart boundaries, headers and the `file-upload` JSON wrapper.
const ENVELOPE_OVERHEAD: usize = 64 * 1024;

/// Configuration for the beam server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// WebSocket upgrades are refused with `503` at this many open connections.
    pub max_connections: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a client is closed, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Max `POST /upload` body size in bytes.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Listener settings derived from loaded settings.
    pub fn from_settings(settings: &BeamSettings) -> Self {
        let max_file_bytes = settings.relay.max_file_bytes;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
            max_message_size: max_message_size_for(max_file_bytes),
            max_upload_bytes: max_file_bytes.saturating_add(ENVELOPE_OVERHEAD),
        }
    }

    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: max_message_size_for(DEFAULT_MAX_FILE_BYTES),
            max_upload_bytes: DEFAULT_MAX_FILE_BYTES + ENVELOPE_OVERHEAD,
        }
    }
}

/// Relay tuning derived from loaded settings.
pub fn relay_config(settings: &BeamSettings) -> RelayConfig {
    RelayConfig {
        limits: EnvelopeLimits {
            max_file_bytes: settings.relay.max_file_bytes,
            max_text_bytes: settings.relay.max_text_bytes,
        },
        queue_capacity: settings.relay.queue_capacity,
        slow_client_drop_limit: settings.relay.slow_client_drop_limit,
    }
}

/// A `file-upload` frame carries base64, so it is 4/3 of the raw ceiling.
fn max_message_size_for(max_file_bytes: usize) -> usize {
    max_file_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_OVERHEAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.max_connections, 1024);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn message_size_fits_encoded_ceiling() {
        let cfg = ServerConfig::default();
        let encoded = DEFAULT_MAX_FILE_BYTES.div_ceil(3) * 4;
        assert!(cfg.max_message_size > encoded);
        assert!(cfg.max_upload_bytes > DEFAULT_MAX_FILE_BYTES);
    }

    #[test]
    fn from_settings_copies_listener_fields() {
        let mut settings = BeamSettings::default();
        settings.server.port = 4000;
        settings.server.max_connections = 7;
        settings.relay.max_file_bytes = 300;
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.max_connections, 7);
        assert_eq!(cfg.max_upload_bytes, 300 + ENVELOPE_OVERHEAD);
        assert_eq!(cfg.max_message_size, 400 + ENVELOPE_OVERHEAD);
    }

    #[test]
    fn relay_config_from_settings() {
        let mut settings = BeamSettings::default();
        settings.relay.queue_capacity = 8;
        settings.relay.slow_client_drop_limit = 3;
        settings.relay.max_text_bytes = 10;
        let relay = relay_config(&settings);
        assert_eq!(relay.queue_capacity, 8);
        assert_eq!(relay.slow_client_drop_limit, 3);
        assert_eq!(relay.limits.max_text_bytes, 10);
        assert_eq!(relay.limits.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"host":"10.0.0.1","port":3000,"max_connections":5,"heartbeat_interval_secs":10,"heartbeat_timeout_secs":30,"max_message_size":512,"max_upload_bytes":1024}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.host, "10.0.0.1");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.max_upload_bytes, 1024);
    }
}
