//! Settings types.

use beam_core::envelope::{DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_TEXT_BYTES};
use beam_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeamSettings {
    /// Network listener and liveness.
    pub server: ServerSettings,
    /// Relay ceilings and backpressure.
    pub relay: RelaySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl BeamSettings {
    /// Reject combinations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(SettingsError::rejected("server.maxConnections", "must be at least 1"));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::rejected(
                "server.heartbeatIntervalSecs",
                "must be at least 1",
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::rejected(
                "server.heartbeatTimeoutSecs",
                "must not be shorter than the heartbeat interval",
            ));
        }
        if self.relay.max_file_bytes == 0 {
            return Err(SettingsError::rejected("relay.maxFileBytes", "must be at least 1"));
        }
        if self.relay.max_text_bytes == 0 {
            return Err(SettingsError::rejected("relay.maxTextBytes", "must be at least 1"));
        }
        if self.relay.queue_capacity == 0 {
            return Err(SettingsError::rejected("relay.queueCapacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// Listener and connection liveness settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// WebSocket upgrades beyond this many open connections get `503`.
    pub max_connections: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence before a client is closed.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

/// Payload ceilings and per-target queue behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Maximum raw file size in bytes (inclusive).
    pub max_file_bytes: usize,
    /// Maximum text snippet size in bytes (inclusive).
    pub max_text_bytes: usize,
    /// Frames buffered per connection before drops start.
    pub queue_capacity: usize,
    /// Cumulative drops after which a slow connection is evicted.
    pub slow_client_drop_limit: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
            queue_capacity: 256,
            slow_client_drop_limit: 100,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
