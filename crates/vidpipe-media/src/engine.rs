//! Media engine abstraction.
//!
//! The pipeline talks to the codec engine through [`MediaEngine`] so the
//! FFmpeg subprocess backend can be replaced (tests use an in-memory fake).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vidpipe_models::AspectRatio;

use crate::command::FfmpegRunner;
use crate::error::MediaResult;
use crate::probe::probe_aspect_ratio;
use crate::thumbnail::{extract_thumbnail, ThumbnailRequest};
use crate::transcode::{transcode, TranscodeOptions};

/// Probe, thumbnail and transcode operations on local files.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Aspect ratio of the first video stream; `None` when unknown. Never fails.
    async fn probe_aspect_ratio(&self, video: &Path) -> Option<AspectRatio>;

    /// Write a single frame to `request.output`.
    async fn extract_thumbnail(&self, request: &ThumbnailRequest) -> MediaResult<PathBuf>;

    /// Re-encode `input` to MP4; returns the path written.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> MediaResult<PathBuf>;
}

/// [`MediaEngine`] backed by the `ffmpeg`/`ffprobe` binaries on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any FFmpeg process running longer than `secs`.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_aspect_ratio(&self, video: &Path) -> Option<AspectRatio> {
        probe_aspect_ratio(video).await
    }

    async fn extract_thumbnail(&self, request: &ThumbnailRequest) -> MediaResult<PathBuf> {
        extract_thumbnail(request, &self.runner).await
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> MediaResult<PathBuf> {
        transcode(input, output, options, &self.runner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    #[ignore = "requires ffmpeg and ffprobe"]
    async fn test_ffmpeg_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mov");

        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=size=320x240:duration=2"])
            .arg(&source)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        let engine = FfmpegEngine::new().with_timeout(Some(60));
        assert_eq!(engine.probe_aspect_ratio(&source).await, AspectRatio::new(320, 240));

        let thumb = engine
            .extract_thumbnail(&ThumbnailRequest::new(&source, dir.path().join("clip.png"), 1.0))
            .await
            .unwrap();
        assert!(thumb.exists());

        let video = engine
            .transcode(&source, &dir.path().join("clip.mp4"), &TranscodeOptions::default())
            .await
            .unwrap();
        assert!(video.exists());

        assert_eq!(engine.probe_aspect_ratio(&video).await, AspectRatio::new(320, 240));
    }
}
