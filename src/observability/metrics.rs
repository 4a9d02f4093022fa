//! Metrics collection and exposition.
//!
//! # Metrics
//! - `insights_requests_total` (counter): tracked requests by method, status
//! - `insights_request_duration_seconds` (histogram): tracked request latency
//! - `insights_submissions_total` (counter): records handed to the telemetry client, by kind
//!
//! Recording is a no-op until a recorder is installed with `init_metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed, tracked request.
pub fn record_request(method: &str, status: &str, duration: Duration) {
    counter!(
        "insights_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("insights_request_duration_seconds", "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Record one submission to the telemetry client.
pub fn record_submission(kind: &'static str) {
    counter!("insights_submissions_total", "kind" => kind).increment(1);
}
