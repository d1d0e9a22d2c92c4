//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use vibecraft_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| Error::governance(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Track one bridge round trip (count and latency).
///
/// `outcome` is one of `ok`, `timeout`, `protocol_error`, `connection_error`.
pub fn track_bridge_request(message_type: &str, outcome: &str, latency_sec: f64) {
    metrics::counter!(
        "bridge_requests_total",
        "type" => message_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "bridge_request_duration_seconds",
        "type" => message_type.to_string()
    )
    .record(latency_sec);
}

pub fn track_bridge_connect_failure() {
    metrics::counter!("bridge_connect_failures_total").increment(1);
}

/// An unsolicited message was dropped because the inbox was full.
pub fn track_inbox_eviction() {
    metrics::counter!("bridge_inbox_evictions_total").increment(1);
}

pub fn track_tool_call(tool: &str, success: bool) {
    metrics::counter!(
        "tool_calls_total",
        "tool" => tool.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}
