//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use vidpipe_media::MediaError;
use vidpipe_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Output produced by one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Thumbnail,
    Video,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Thumbnail => "thumbnail",
            Artifact::Video => "video",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Thumbnail extraction failed: {0}")]
    Extraction(#[source] MediaError),

    #[error("Transcode failed: {0}")]
    Transcode(#[source] MediaError),

    #[error("Missing {artifact} output at {}", path.display())]
    Verification { artifact: Artifact, path: PathBuf },

    #[error("Upload of {artifact} failed: {source}")]
    Upload {
        artifact: Artifact,
        #[source]
        source: StorageError,
    },

    #[error("Finalizing source failed: {0}")]
    Finalize(#[source] StorageError),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn upload(artifact: Artifact, source: StorageError) -> Self {
        Self::Upload { artifact, source }
    }

    /// Stage label used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ConfigError(_) => "config",
            PipelineError::Download(_) => "download",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Transcode(_) => "transcode",
            PipelineError::Verification { .. } => "verification",
            PipelineError::Upload { .. } => "upload",
            PipelineError::Finalize(_) => "finalize",
        }
    }
}
