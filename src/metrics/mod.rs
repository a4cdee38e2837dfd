//! Metrics capability plus the Prometheus recorder installer.
//!
//! Components depend on the [`Metrics`] trait, never on the global
//! recorder directly, so tests can swap in a no-op or capturing impl.

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::domain::{InventoryOpsError, Result};

/// Metric emission capability. All calls are non-blocking.
pub trait Metrics: Send + Sync {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64);
    fn gauge(&self, name: &'static str, value: f64);
    fn histogram(&self, name: &'static str, value: f64);
}

pub type SharedMetrics = Arc<dyn Metrics>;

/// Forwards to the `metrics` facade (and through it to whatever
/// recorder is installed, Prometheus in production).
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderMetrics;

impl Metrics for RecorderMetrics {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64) {
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|(k, v)| metrics::Label::new(*k, v.clone()))
            .collect();
        metrics::counter!(name, value, labels);
    }

    fn gauge(&self, name: &'static str, value: f64) {
        metrics::gauge!(name, value);
    }

    fn histogram(&self, name: &'static str, value: f64) {
        metrics::histogram!(name, value);
    }
}

/// Discards everything; the default for unit tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn counter(&self, _name: &'static str, _labels: &[(&'static str, String)], _value: u64) {}
    fn gauge(&self, _name: &'static str, _value: f64) {}
    fn histogram(&self, _name: &'static str, _value: f64) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub prometheus_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Install the Prometheus exporter. Call once at process start.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        tracing::info!("metrics collection is disabled");
        return Ok(());
    }

    let addr: SocketAddr = config.prometheus_addr.parse().map_err(|e| {
        InventoryOpsError::InvalidArgument(format!("invalid Prometheus address: {}", e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            InventoryOpsError::DependencyUnavailable(format!(
                "failed to install Prometheus exporter: {}",
                e
            ))
        })?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter initialized");
    metrics::counter!("inventory_ops_info", 1);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics_accept_everything() {
        let m = NoopMetrics;
        m.counter("inventory_ops_forecast_runs_total", &[], 1);
        m.gauge("inventory_ops_drift_items", 3.0);
        m.histogram("inventory_ops_run_duration_ms", 120.0);
    }

    #[test]
    fn test_invalid_prometheus_addr_rejected() {
        let config = MetricsConfig {
            enabled: true,
            prometheus_addr: "not-an-addr".into(),
        };
        assert!(init_metrics(&config).is_err());
    }
}
