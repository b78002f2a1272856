//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_requests_received_total` (counter)
//! - `gatekeeper_responses_sent_total` (counter): by status
//! - `gatekeeper_request_duration_seconds` (histogram)
//! - `gatekeeper_rate_limited_total` (counter)
//! - `gatekeeper_error_responses_total` (counter): by error kind
//! - `gatekeeper_tracked_clients` (gauge): entries in the client registry

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_rate_limited() {
    counter!("gatekeeper_rate_limited_total").increment(1);
}

pub fn record_error_response(kind: &'static str) {
    counter!("gatekeeper_error_responses_total", "kind" => kind).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("gatekeeper_tracked_clients").set(count as f64);
}

/// Middleware counting requests and responses and timing each request.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    counter!("gatekeeper_requests_received_total").increment(1);

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!("gatekeeper_responses_sent_total", "status" => status).increment(1);
    histogram!("gatekeeper_request_duration_seconds").record(start.elapsed().as_secs_f64());

    response
}
