//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize metrics exporter and server.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(err) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %err, "failed to install Prometheus recorder");
        return;
    }

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record one gateway request.
pub fn record_request(method: &str, path: &str, status: u16, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

/// A transport was added to the fleet.
pub fn record_pool_scale_up() {
    counter!("rpc_pool_scale_up_total").increment(1);
}

/// `idle_count` idle transports were closed in one monitor tick.
pub fn record_pool_scale_down(idle_count: u64) {
    counter!("rpc_pool_scale_down_total").increment(idle_count);
}

/// Fleet size and total in-flight requests, sampled by the pool monitor.
pub fn record_pool_gauges(fleet: usize, active: usize) {
    gauge!("rpc_pool_clients").set(fleet as f64);
    gauge!("rpc_pool_active_requests").set(active as f64);
}

/// A call's deadline elapsed before its response arrived.
pub fn record_call_timeout() {
    counter!("rpc_call_timeouts_total").increment(1);
}

/// A response arrived for a correlation ID with no pending call.
pub fn record_unmatched_response() {
    counter!("rpc_unmatched_responses_total").increment(1);
}
