//! Prometheus metrics for follow-graph operations
//!
//! Registered in the default registry; `followgraph --metrics` prints them
//! after a command finishes.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Counter: mutations by kind and outcome
    pub static ref MUTATIONS: CounterVec = register_counter_vec!(
        "followgraph_mutations_total",
        "Follow/unfollow requests by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to create mutations metric");

    /// Counter: read cache lookups (hit/miss)
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec!(
        "followgraph_cache_operations_total",
        "Read cache lookups by result",
        &["kind", "result"]
    )
    .expect("Failed to create cache_operations metric");

    /// Counter: live re-checks caused by overlay/API disagreement
    pub static ref CONSISTENCY_RETRIES: CounterVec = register_counter_vec!(
        "followgraph_consistency_retries_total",
        "Immediate live re-checks after an overlay mismatch",
        &["resolution"]
    )
    .expect("Failed to create consistency_retries metric");

    /// Counter: read requests retried after a transient failure
    pub static ref READ_RETRIES: CounterVec = register_counter_vec!(
        "followgraph_read_retries_total",
        "Retried read requests by operation",
        &["operation"]
    )
    .expect("Failed to create read_retries metric");

    /// Histogram: wall-clock duration of batch runs (seconds)
    pub static ref BATCH_DURATION: HistogramVec = register_histogram_vec!(
        "followgraph_batch_duration_seconds",
        "Duration of batch mutation runs",
        &["kind"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]
    )
    .expect("Failed to create batch_duration metric");
}

pub fn record_mutation(kind: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    MUTATIONS.with_label_values(&[kind, outcome]).inc();
}

pub fn record_cache_lookup(kind: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_OPERATIONS.with_label_values(&[kind, result]).inc();
}

/// `resolution` is "retry" for each extra check and "unresolved" when the
/// mismatch outlived every attempt
pub fn record_consistency_retry(resolution: &str) {
    CONSISTENCY_RETRIES.with_label_values(&[resolution]).inc();
}

pub fn record_read_retry(operation: &str) {
    READ_RETRIES.with_label_values(&[operation]).inc();
}

pub fn record_batch_duration(kind: &str, duration_secs: f64) {
    BATCH_DURATION.with_label_values(&[kind]).observe(duration_secs);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
