//! Prometheus metrics for the tollgate admission server
//!
//! - Admission decisions per identity kind
//! - Bucket store failures (the fail-open path)
//! - Bucket store round-trip latency

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounterVec, TextEncoder, opts, register_histogram,
    register_int_counter_vec,
};

// ============================================================================
// Admission Metrics
// ============================================================================

/// Admission decisions (identity = user|anonymous, decision = allowed|denied|fail_open)
pub static ADMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "tollgate_admissions_total",
            "Admission decisions taken by the rate limiting gate"
        ),
        &["identity", "decision"]
    )
    .expect("Failed to register ADMISSIONS_TOTAL metric")
});

// ============================================================================
// Bucket Store Metrics
// ============================================================================

/// Bucket store failures by reason (unavailable, timeout, malformed)
pub static STORE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "tollgate_store_failures_total",
            "Bucket store failures that caused a request to be admitted without accounting"
        ),
        &["reason"]
    )
    .expect("Failed to register STORE_FAILURES_TOTAL metric")
});

/// Latency of the atomic read-modify-write against the bucket store
pub static STORE_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tollgate_store_latency_seconds",
        "Bucket store read-modify-write latency in seconds",
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]
    )
    .expect("Failed to register STORE_LATENCY_SECONDS metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
