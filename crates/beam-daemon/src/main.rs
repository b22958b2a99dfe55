//! # beamd
//!
//! Beam relay server binary. Loads settings, installs logging and the
//! metrics recorder, wires the relay into the HTTP/WebSocket server and
//! drains sessions on ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beam_core::logging::{LogFormat, init_subscriber};
use beam_relay::Relay;
use beam_server::config::relay_config;
use beam_server::metrics::{MetricsObserver, install_recorder};
use beam_server::{BeamServer, ServerConfig};
use beam_settings::{BeamSettings, LoadedSettings};
use clap::Parser;

/// Beam relay server.
#[derive(Parser, Debug)]
#[command(name = "beamd", about = "Real-time text and file relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.beam/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `beam_relay=trace`.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(beam_settings::settings_path)
    }

    /// Command-line flags win over every settings layer.
    fn apply(&self, settings: &mut BeamSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings_path();
    let LoadedSettings {
        mut settings,
        ignored,
    } = beam_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    // Settings decide the log level, so load rejections are reported here.
    init_subscriber(&settings.logging.level, settings.logging.format);
    for rejected in &ignored {
        rejected.log();
    }

    let metrics = match install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let relay = Arc::new(Relay::with_observer(
        relay_config(&settings),
        Arc::new(MetricsObserver),
    ));
    let server = BeamServer::new(ServerConfig::from_settings(&settings), relay, metrics);

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        max_file_bytes = settings.relay.max_file_bytes,
        max_connections = settings.server.max_connections,
        "beam relay listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!(
        sessions = server.shutdown().active_tasks(),
        "Shutting down..."
    );
    if !server.shutdown().graceful_shutdown(None).await {
        tracing::warn!("sessions did not drain before the shutdown timeout");
    }
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["beamd"]);
        let mut settings = BeamSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, BeamSettings::default());
    }

    #[test]
    fn cli_overrides_listener() {
        let cli = Cli::parse_from(["beamd", "--host", "0.0.0.0", "--port", "8080"]);
        let mut settings = BeamSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn cli_overrides_logging() {
        let cli = Cli::parse_from(["beamd", "--log-level", "debug", "--log-format", "json"]);
        let mut settings = BeamSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["beamd", "--port", "99999"]).is_err());
        assert!(Cli::try_parse_from(["beamd", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["beamd", "--config", "/etc/beam/settings.json"]);
        assert_eq!(
            cli.settings_path(),
            PathBuf::from("/etc/beam/settings.json")
        );
        let cli = Cli::parse_from(["beamd"]);
        assert_eq!(cli.settings_path(), beam_settings::settings_path());
    }

    #[test]
    fn config_file_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":4000,"host":"10.0.0.1"}}"#).unwrap();

        let cli = Cli::parse_from(["beamd", "--port", "5000"]);
        let mut settings = beam_settings::loader::load_with(&path, |_| None).unwrap().settings;
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 5000);
    }
}
