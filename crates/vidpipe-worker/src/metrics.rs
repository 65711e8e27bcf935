//! Prometheus metrics for the pipeline.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{PipelineError, PipelineResult};

/// Install the Prometheus recorder.
/// Returns a handle that renders the exposition text for `GET /metrics`.
pub fn init_metrics() -> PipelineResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::config_error(format!("failed to install Prometheus recorder: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const INVOCATIONS_TOTAL: &str = "vidpipe_invocations_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "vidpipe_pipeline_duration_seconds";
    /// Recorded by the media crate around each FFmpeg run
    pub const FFMPEG_DURATION_SECONDS: &str = "vidpipe_ffmpeg_duration_seconds";
    pub const BYTES_UPLOADED_TOTAL: &str = "vidpipe_bytes_uploaded_total";
}

/// Record a finished invocation.
pub fn record_invocation(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::INVOCATIONS_TOTAL, &labels).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_bytes_uploaded(bytes: u64) {
    counter!(names::BYTES_UPLOADED_TOTAL).increment(bytes);
}
