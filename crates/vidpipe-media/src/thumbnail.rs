//! Thumbnail generation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use metrics::histogram;
use tracing::debug;
use vidpipe_models::AspectRatio;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// A single still-frame extraction.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    /// Local video to read
    pub video: PathBuf,
    /// Image to write; the format follows the extension
    pub output: PathBuf,
    /// Position of the frame, in seconds from the start
    pub timestamp_secs: f64,
    /// Geometry to force on the frame; native geometry when `None`
    pub aspect_ratio: Option<AspectRatio>,
}

impl ThumbnailRequest {
    pub fn new(video: impl AsRef<Path>, output: impl AsRef<Path>, timestamp_secs: f64) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            timestamp_secs,
            aspect_ratio: None,
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Build the FFmpeg invocation for this request.
    pub fn to_command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.video, &self.output)
            .seek(self.timestamp_secs.max(0.0))
            .single_frame();

        if let Some(ratio) = self.aspect_ratio {
            cmd = cmd.video_filter(aspect_filter(ratio));
        }

        if is_jpeg(&self.output) {
            cmd = cmd.output_arg("-q:v").output_arg("2");
        }

        cmd.log_level("error")
    }
}

/// Scale the frame width to match `ratio`, keeping height, with square pixels.
fn aspect_filter(ratio: AspectRatio) -> String {
    format!(
        "scale=trunc(ih*{}/{}/2)*2:ih,setsar=1",
        ratio.width, ratio.height
    )
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Extract one frame from a video file into `request.output`.
///
/// When the video is shorter than the timestamp, FFmpeg's own end-of-stream
/// behaviour applies.
pub async fn extract_thumbnail(
    request: &ThumbnailRequest,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    if !request.video.exists() {
        return Err(MediaError::FileNotFound(request.video.clone()));
    }

    debug!(
        "Extracting thumbnail at {:.3}s from {} (aspect: {})",
        request.timestamp_secs,
        request.video.display(),
        request
            .aspect_ratio
            .map(|r| r.to_string())
            .unwrap_or_else(|| "native".to_string())
    );

    let started = Instant::now();
    let result = runner.run(&request.to_command()).await;
    histogram!("vidpipe_ffmpeg_duration_seconds", "operation" => "thumbnail")
        .record(started.elapsed().as_secs_f64());

    result?;
    frame_written(&request.output).await
}

/// FFmpeg can exit cleanly without writing a frame, e.g. when seeking past the end.
async fn frame_written(output: &Path) -> MediaResult<PathBuf> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(output.to_path_buf()),
        _ => Err(MediaError::FileNotFound(output.to_path_buf())),
    }
}
