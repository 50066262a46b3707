//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use crate::config::LogFormat;
pub use self::logging::init_logging;
pub use self::metrics::{
    increment, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Guard that keeps telemetry alive for the lifetime of the process
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
///
/// Must be called from within a tokio runtime when a metrics port is
/// configured, since the exporter serves scrapes on a background task.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    Ok(TelemetryGuard { _priv: () })
}
