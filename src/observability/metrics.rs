//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, credential refreshes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_sigv4_requests_total` (counter): requests by route, method, status
//! - `proxy_sigv4_request_duration_seconds` (histogram): latency by route
//! - `proxy_sigv4_credential_refresh_total` (counter): refreshes by route, outcome
//! - `proxy_sigv4_routes_skipped_total` (counter): routes dropped at startup by reason
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   deployments without `metrics_enabled` pay nothing
//! - Labels use mount paths, never full request paths (bounded cardinality)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "proxy_sigv4_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "proxy_sigv4_request_duration_seconds";
pub const CREDENTIAL_REFRESH_TOTAL: &str = "proxy_sigv4_credential_refresh_total";
pub const ROUTES_SKIPPED_TOTAL: &str = "proxy_sigv4_routes_skipped_total";

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one proxied request.
pub fn record_request(route: &str, method: &str, status: u16, start_time: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "route" => route.to_string())
        .record(start_time.elapsed().as_secs_f64());
}

/// Record a background credential refresh attempt.
pub fn record_credential_refresh(route: &str, outcome: &'static str) {
    metrics::counter!(CREDENTIAL_REFRESH_TOTAL, "route" => route.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record a route dropped during assembly.
pub fn record_route_skipped(reason: &'static str) {
    metrics::counter!(ROUTES_SKIPPED_TOTAL, "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("/test", "GET", 200, Instant::now());
        record_credential_refresh("/test", "success");
        record_route_skipped("invalid_config");
    }
}
