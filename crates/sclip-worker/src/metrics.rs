//! Pipeline metrics.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::{PipelineStage, WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const RECORDS_COMMITTED_TOTAL: &str = "sclip_records_committed_total";
    pub const RECORDS_ABORTED_TOTAL: &str = "sclip_records_aborted_total";
    pub const CLIPS_PUBLISHED_TOTAL: &str = "sclip_clips_published_total";
    pub const PUBLISH_FAILURES_TOTAL: &str = "sclip_publish_failures_total";
    pub const CYCLE_DURATION_SECONDS: &str = "sclip_cycle_duration_seconds";
}

/// Install the Prometheus exporter listening on `addr`.
///
/// Without an address no recorder is installed and metric calls are no-ops.
pub fn init_metrics(addr: Option<SocketAddr>) -> WorkerResult<()> {
    let Some(addr) = addr else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("failed to start metrics exporter: {}", e)))?;

    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}

pub fn record_committed(clips: usize) {
    counter!(names::RECORDS_COMMITTED_TOTAL).increment(1);
    counter!(names::CLIPS_PUBLISHED_TOTAL).increment(clips as u64);
}

pub fn record_aborted(stage: PipelineStage) {
    counter!(names::RECORDS_ABORTED_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_publish_failure() {
    counter!(names::PUBLISH_FAILURES_TOTAL).increment(1);
}

pub fn record_cycle(duration: Duration) {
    histogram!(names::CYCLE_DURATION_SECONDS).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::RECORDS_ABORTED_TOTAL.starts_with("sclip_"));
        assert!(names::CYCLE_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_init_without_address_is_noop() {
        assert!(init_metrics(None).is_ok());
        record_aborted(PipelineStage::Fetch);
    }
}
