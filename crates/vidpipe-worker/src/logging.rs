//! Structured invocation logging.
//!
//! Every lifecycle line of an invocation carries the same identifying
//! fields so one upload can be followed through the logs.

use tracing::{error, info, warn, Span};
use vidpipe_models::SourceObject;

/// Logger for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    invocation_id: String,
    bucket: String,
    source_path: String,
}

impl InvocationLogger {
    pub fn new(invocation_id: impl Into<String>, source: &SourceObject) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            bucket: source.bucket.clone(),
            source_path: source.name.clone(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            "Invocation started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            "Invocation progress: {}", message
        );
    }

    /// Log a rejected event. Not an error; the object is simply not ours.
    pub fn log_skipped(&self, reason: &str) {
        info!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            "Invocation skipped: {}", reason
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            "Invocation warning: {}", message
        );
    }

    /// Log a failed invocation with the stage that failed.
    pub fn log_error(&self, stage: &str, message: &str) {
        error!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            stage = %stage,
            "Invocation failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path,
            "Invocation completed: {}", message
        );
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Span wrapping the whole invocation, including media and storage calls.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "invocation",
            invocation_id = %self.invocation_id,
            bucket = %self.bucket,
            source_path = %self.source_path
        )
    }
}
