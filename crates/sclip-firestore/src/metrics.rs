//! Firestore metrics collection.
//!
//! Request counters by operation and status, plus latency histograms.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "sclip_firestore_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "sclip_firestore_latency_seconds";

    /// Documents skipped by claims because they exceeded the failure limit.
    pub const QUARANTINED_SKIPS_TOTAL: &str = "sclip_firestore_quarantined_skips_total";
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

pub fn record_quarantined_skip() {
    counter!(names::QUARANTINED_SKIPS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.starts_with("sclip_firestore_"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }
}
