//! Prometheus metrics for the proxy pipeline.
//!
//! One counter/histogram pair per handling branch (`binary`, `playlist`,
//! `subtitle`, `fallback`), plus an upstream-failure counter. Rendered at
//! `GET /metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use std::time::Instant;

/// Global recorder, installed the first time a handle is requested. Router
/// construction requests one eagerly, so handlers never record into the
/// default no-op recorder; the recorder can only ever be installed once,
/// which also keeps repeated router construction in tests safe.
static PROMETHEUS: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
});

/// Handle for rendering the exposition format.
pub fn prometheus_handle() -> PrometheusHandle {
    PROMETHEUS.clone()
}

/// Count one proxied request, labeled by handling branch and status code.
pub fn record_request(branch: &'static str, status: u16) {
    counter!("vidproxy_requests_total", "branch" => branch, "status" => status.to_string())
        .increment(1);
}

/// Record elapsed wall time for a handling branch.
pub fn record_duration(branch: &'static str, start: Instant) {
    histogram!("vidproxy_request_duration_seconds", "branch" => branch)
        .record(start.elapsed().as_secs_f64());
}

/// Count one upstream fetch failure (transport error or status >= 400).
pub fn record_upstream_error() {
    counter!("vidproxy_upstream_errors_total").increment(1);
}
