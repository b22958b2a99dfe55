//! Prometheus metrics recorder, `/metrics` rendering, and the relay observer
//! that feeds them.

use beam_core::envelope::Envelope;
use beam_core::errors::{DeliveryError, RelayError};
use beam_relay::{Connection, DeliveryReport, RelayObserver};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Connections opened (counter).
pub const CONNECTIONS_OPENED_TOTAL: &str = "beam_connections_opened_total";
/// Connections closed, by disconnect or eviction (counter).
pub const CONNECTIONS_CLOSED_TOTAL: &str = "beam_connections_closed_total";
/// Registered connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "beam_connections_active";
/// Broadcasts sent (counter, labels: kind).
pub const BROADCASTS_TOTAL: &str = "beam_broadcasts_total";
/// Targets per broadcast (histogram).
pub const BROADCAST_RECIPIENTS: &str = "beam_broadcast_recipients";
/// Failed per-target deliveries (counter, labels: reason).
pub const DELIVERIES_FAILED_TOTAL: &str = "beam_deliveries_failed_total";
/// Rejected submissions (counter, labels: code).
pub const REJECTIONS_TOTAL: &str = "beam_rejections_total";
/// WebSocket session duration seconds (histogram).
pub const SESSION_DURATION_SECONDS: &str = "beam_session_duration_seconds";
/// HTTP uploads accepted (counter).
pub const UPLOADS_TOTAL: &str = "beam_uploads_total";

/// [`RelayObserver`] that records relay activity through the `metrics` facade.
///
/// Without an installed recorder every call is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsObserver;

#[allow(clippy::cast_precision_loss)]
impl RelayObserver for MetricsObserver {
    fn on_connection_opened(&self, _connection: &Connection, active: usize) {
        counter!(CONNECTIONS_OPENED_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).set(active as f64);
    }

    fn on_connection_closed(&self, _connection: &Connection, active: usize) {
        counter!(CONNECTIONS_CLOSED_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).set(active as f64);
    }

    fn on_deliver(
        &self,
        _target: &Connection,
        _envelope: &Envelope,
        outcome: Result<(), DeliveryError>,
    ) {
        if let Err(error) = outcome {
            counter!(DELIVERIES_FAILED_TOTAL, "reason" => error.reason()).increment(1);
        }
    }

    fn on_broadcast(&self, envelope: &Envelope, report: &DeliveryReport) {
        counter!(BROADCASTS_TOTAL, "kind" => envelope.kind().as_str()).increment(1);
        histogram!(BROADCAST_RECIPIENTS).record(report.attempted as f64);
    }

    fn on_rejected(&self, error: &RelayError) {
        counter!(REJECTIONS_TOTAL, "code" => error.code()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beam_relay::{Relay, RelayConfig};
    use std::sync::Arc;

    fn local_handle() -> (metrics_exporter_prometheus::PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn observer_records_relay_activity() {
        let (recorder, handle) = local_handle();
        metrics::with_local_recorder(&recorder, || {
            let relay = Relay::with_observer(RelayConfig::default(), Arc::new(MetricsObserver));
            let (origin, _rx) = relay.open();
            let (gone, rx_gone) = relay.open();
            drop(rx_gone);
            let _ = relay.submit_text(&origin, "hi").unwrap();
            let _ = relay.submit_text(&origin, " ").unwrap_err();
            let _ = relay.close(gone.id());
        });

        let text = render(&handle);
        assert!(text.contains("beam_connections_opened_total 2"));
        assert!(text.contains("beam_connections_closed_total 1"));
        assert!(text.contains("beam_connections_active 1"));
        assert!(text.contains(r#"beam_broadcasts_total{kind="text"} 1"#));
        assert!(text.contains(r#"beam_deliveries_failed_total{reason="closed"} 1"#));
        assert!(text.contains(r#"beam_rejections_total{code="VALIDATION_ERROR"} 1"#));
    }

    #[test]
    fn observer_without_recorder_is_noop() {
        let relay = Relay::with_observer(RelayConfig::default(), Arc::new(MetricsObserver));
        let (origin, _rx) = relay.open();
        assert!(relay.submit_text(&origin, "hi").is_ok());
    }

    #[test]
    fn render_empty_handle() {
        let (_recorder, handle) = local_handle();
        assert!(!render(&handle).contains("beam_"));
    }
}
