//! Metrics collection and exposition.
//!
//! # Metrics
//! - `oscq_commands_total` (counter): commands received, by command
//! - `oscq_service_starts_total` (counter): successful service starts
//! - `oscq_service_start_failures_total` (counter): failed service starts
//! - `oscq_service_running` (gauge): 1=running, 0=stopped
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_command(command: &str) {
    counter!("oscq_commands_total", "command" => command.to_string()).increment(1);
}

pub fn record_service_start(success: bool) {
    if success {
        counter!("oscq_service_starts_total").increment(1);
    } else {
        counter!("oscq_service_start_failures_total").increment(1);
    }
}

pub fn set_service_running(running: bool) {
    gauge!("oscq_service_running").set(if running { 1.0 } else { 0.0 });
}
