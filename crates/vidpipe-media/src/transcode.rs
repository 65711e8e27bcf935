//! MP4 normalization (H.264 video, AAC audio).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, info};
use vidpipe_models::encoding::{
    DEFAULT_AUDIO_CODEC, DEFAULT_CRF, DEFAULT_PRESET, DEFAULT_VIDEO_CODEC, TARGET_EXTENSION,
};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Output frame size override.
///
/// Accepts `WxH`, `Wx?` (fixed width), `?xH` (fixed height) and `N%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSize {
    Exact { width: u32, height: u32 },
    Width(u32),
    Height(u32),
    Percent(u32),
}

impl VideoSize {
    /// Scale filter implementing this size; free dimensions stay even for H.264.
    pub fn to_filter(&self) -> String {
        match self {
            VideoSize::Exact { width, height } => format!("scale={}:{}", width, height),
            VideoSize::Width(width) => format!("scale={}:-2", width),
            VideoSize::Height(height) => format!("scale=-2:{}", height),
            VideoSize::Percent(pct) => format!(
                "scale=trunc(iw*{pct}/200)*2:trunc(ih*{pct}/200)*2",
                pct = pct
            ),
        }
    }
}

impl FromStr for VideoSize {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || MediaError::invalid_option(format!("invalid video size '{}'", s));
        let dimension = |v: &str| v.trim().parse::<u32>().ok().filter(|n| *n > 0);

        if let Some(pct) = s.strip_suffix('%') {
            return dimension(pct).map(VideoSize::Percent).ok_or_else(invalid);
        }

        let (width, height) = s
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(invalid)?;

        match (width.trim(), height.trim()) {
            ("?", "?") => Err(invalid()),
            ("?", h) => dimension(h).map(VideoSize::Height).ok_or_else(invalid),
            (w, "?") => dimension(w).map(VideoSize::Width).ok_or_else(invalid),
            (w, h) => match (dimension(w), dimension(h)) {
                (Some(width), Some(height)) => Ok(VideoSize::Exact { width, height }),
                _ => Err(invalid()),
            },
        }
    }
}

/// Bitrate in FFmpeg notation. Bare numbers are kbit/s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitrate(String);

impl Bitrate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Bitrate {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, suffix) = match s.char_indices().last() {
            Some((idx, c)) if c.is_ascii_alphabetic() => (&s[..idx], Some(c)),
            _ => (s, None),
        };

        let valid_number = number.parse::<f64>().map(|n| n > 0.0).unwrap_or(false);
        match suffix {
            _ if !valid_number => Err(MediaError::invalid_option(format!("invalid bitrate '{}'", s))),
            None => Ok(Bitrate(format!("{}k", number))),
            Some('k' | 'K' | 'm' | 'M') => Ok(Bitrate(s.to_string())),
            Some(_) => Err(MediaError::invalid_option(format!("invalid bitrate '{}'", s))),
        }
    }
}

/// Encoding overrides for a transcode.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeOptions {
    pub size: Option<VideoSize>,
    pub video_bitrate: Option<Bitrate>,
    pub audio_bitrate: Option<Bitrate>,
    /// Constant-quality factor; ignored when `video_bitrate` is set
    pub crf: Option<u8>,
    pub preset: Option<String>,
    /// Move the index to the front of the file
    pub faststart: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            size: None,
            video_bitrate: None,
            audio_bitrate: None,
            crf: Some(DEFAULT_CRF),
            preset: Some(DEFAULT_PRESET.to_string()),
            faststart: true,
        }
    }
}

impl TranscodeOptions {
    /// Build the FFmpeg invocation for `input` -> `output`.
    pub fn to_command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(input, output).video_codec(DEFAULT_VIDEO_CODEC);

        if let Some(preset) = &self.preset {
            cmd = cmd.preset(preset.clone());
        }

        match (&self.video_bitrate, self.crf) {
            (Some(bitrate), _) => cmd = cmd.video_bitrate(bitrate.as_str()),
            (None, Some(crf)) => cmd = cmd.crf(crf),
            (None, None) => {}
        }

        if let Some(size) = &self.size {
            cmd = cmd.video_filter(size.to_filter());
        }

        cmd = cmd.audio_codec(DEFAULT_AUDIO_CODEC);
        if let Some(bitrate) = &self.audio_bitrate {
            cmd = cmd.audio_bitrate(bitrate.as_str());
        }

        if self.faststart {
            cmd = cmd.faststart();
        }

        cmd.log_level("error")
    }
}

/// Output path that never aliases `input`.
///
/// When `output` names the input file, the output becomes
/// `<stem>_transcoded.mp4` next to it.
pub fn non_aliasing_output(input: &Path, output: &Path) -> PathBuf {
    if input != output {
        return output.to_path_buf();
    }

    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());

    output.with_file_name(format!("{}_transcoded.{}", stem, TARGET_EXTENSION))
}

/// Re-encode `input` into a normalized MP4.
///
/// Returns the path actually written (see [`non_aliasing_output`]).
pub async fn transcode(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &TranscodeOptions,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let output = non_aliasing_output(input, output.as_ref());
    let cmd = options.to_command(input, &output);

    info!("Transcoding {} -> {}", input.display(), output.display());

    let started = Instant::now();
    let result = runner
        .run_with_progress(&cmd, |progress| {
            debug!(
                frame = progress.frame,
                out_time = %progress.out_time,
                speed = progress.speed,
                "Transcode progress"
            );
        })
        .await;
    histogram!("vidpipe_ffmpeg_duration_seconds", "operation" => "transcode")
        .record(started.elapsed().as_secs_f64());

    result.map(|_| output)
}
