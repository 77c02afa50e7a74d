//! Request counters/histograms exposed on `/metrics`, alongside the
//! structured `tracing` spans every request already logs. One process-wide
//! registry — there is exactly one `ember-rpc` dispatch core per server, so
//! a `once_cell`-backed `prometheus::Registry` is simpler than threading a
//! handle through every handler.

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        prometheus::Opts::new("ember_rpc_requests_total", "Total JSON-RPC requests handled"),
        &["namespace", "method", "outcome"],
    )
    .expect("metric names are valid");
    REGISTRY.register(Box::new(counter.clone())).expect("metric registered once");
    counter
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        prometheus::HistogramOpts::new("ember_rpc_request_duration_seconds", "JSON-RPC request handling latency"),
        &["namespace", "method"],
    )
    .expect("metric names are valid");
    REGISTRY.register(Box::new(histogram.clone())).expect("metric registered once");
    histogram
});

/// Record one completed request. `outcome` is `"success"`, `"error"`, or
/// `"unauthorized"` — the same three words the wire protocol itself uses.
pub fn record_request(namespace: &str, method: &str, outcome: &str, duration_secs: f64) {
    REQUESTS_TOTAL.with_label_values(&[namespace, method, outcome]).inc();
    REQUEST_DURATION.with_label_values(&[namespace, method]).observe(duration_secs);
}

/// Render the current state of every registered metric in the Prometheus
/// text exposition format, for the `/metrics` HTTP endpoint.
pub fn render() -> String {
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf).expect("text encoding does not fail");
    String::from_utf8(buf).expect("prometheus text output is always valid utf-8")
}
