//! Firestore metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to the
//! embedding application.

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Reads served from the persistent cache, by reason.
    pub const CACHE_READS_TOTAL: &str = "firestore_cache_reads_total";

    /// Switches from the default transport to HTTP/1.1.
    pub const TRANSPORT_FALLBACKS_TOTAL: &str = "firestore_transport_fallbacks_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a read answered from the on-disk cache.
pub fn record_cache_read(reason: &'static str) {
    counter!(names::CACHE_READS_TOTAL, "reason" => reason).increment(1);
}

/// Record a transport downgrade.
pub fn record_transport_fallback() {
    counter!(names::TRANSPORT_FALLBACKS_TOTAL).increment(1);
}
