//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_requests_total` (counter): requests by route, method, status
//! - `bff_request_duration_seconds` (histogram): time to response head
//! - `bff_upstream_requests_total` (counter): backend calls by status
//! - `bff_upstream_duration_seconds` (histogram): backend time to response head
//! - `bff_stream_end_total` (counter): relayed streams by outcome
//! - `bff_meta_cache_total` (counter): meta-description lookups by result
//! - `bff_meta_cache_entries` (gauge): cached URLs
//! - `bff_session_forks_total` (counter): fork attempts by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "bff_requests_total",
        "route" => route,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("bff_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream(status: u16, start: Instant) {
    metrics::counter!("bff_upstream_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("bff_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_stream_end(outcome: &'static str) {
    metrics::counter!("bff_stream_end_total", "outcome" => outcome).increment(1);
}

pub fn record_meta_lookup(result: &'static str) {
    metrics::counter!("bff_meta_cache_total", "result" => result).increment(1);
}

pub fn record_meta_cache_size(size: usize) {
    metrics::gauge!("bff_meta_cache_entries").set(size as f64);
}

pub fn record_fork(outcome: &'static str) {
    metrics::counter!("bff_session_forks_total", "outcome" => outcome).increment(1);
}
