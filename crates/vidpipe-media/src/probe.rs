//! FFprobe video information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

use vidpipe_models::AspectRatio;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    display_aspect_ratio: Option<String>,
}

impl FfprobeOutput {
    fn first_video_stream(&self) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
    }

    /// Pixel dimensions of the first video stream, else its display aspect ratio.
    fn aspect_ratio(&self) -> Option<AspectRatio> {
        let stream = self.first_video_stream()?;

        if let (Some(width), Some(height)) = (stream.width, stream.height) {
            if let Some(ratio) = AspectRatio::new(width, height) {
                return Some(ratio);
            }
        }

        stream
            .display_aspect_ratio
            .as_deref()
            .and_then(|dar| dar.parse().ok())
    }
}

/// Run ffprobe and parse its JSON report.
async fn run_ffprobe(path: &Path) -> MediaResult<FfprobeOutput> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Aspect ratio of the first video stream, or `None` when it cannot be determined.
///
/// Never fails: a missing binary, unreadable file or malformed report all
/// resolve to `None`, which callers treat as "keep native geometry".
pub async fn probe_aspect_ratio(path: impl AsRef<Path>) -> Option<AspectRatio> {
    let path = path.as_ref();

    match run_ffprobe(path).await {
        Ok(probe) => probe.aspect_ratio(),
        Err(e) => {
            warn!("Could not read video metadata for {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_aspect_ratio_prefers_dimensions() {
        let probe = parse(
            r#"{"streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "width": 1280, "height": 720, "display_aspect_ratio": "4:3"}
            ]}"#,
        );
        assert_eq!(probe.aspect_ratio(), AspectRatio::new(1280, 720));
    }

    #[test]
    fn test_aspect_ratio_falls_back_to_display_ratio() {
        let probe = parse(r#"{"streams": [{"codec_type": "video", "display_aspect_ratio": "16:9"}]}"#);
        assert_eq!(probe.aspect_ratio(), Some(AspectRatio::WIDESCREEN));

        let probe = parse(
            r#"{"streams": [{"codec_type": "video", "width": 0, "height": 0, "display_aspect_ratio": "16:9"}]}"#,
        );
        assert_eq!(probe.aspect_ratio(), Some(AspectRatio::WIDESCREEN));
    }

    #[test]
    fn test_aspect_ratio_unknown() {
        let probe = parse(r#"{"streams": [{"codec_type": "video", "display_aspect_ratio": "0:1"}]}"#);
        assert_eq!(probe.aspect_ratio(), None);

        let probe = parse(r#"{"streams": [{"codec_type": "audio"}]}"#);
        assert_eq!(probe.aspect_ratio(), None);

        let probe = parse(r#"{}"#);
        assert_eq!(probe.aspect_ratio(), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file_is_unknown() {
        let ratio = probe_aspect_ratio("/nonexistent/vidpipe/clip.mov").await;
        assert!(ratio.is_none());
    }
}
