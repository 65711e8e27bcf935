//! Worker configuration.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use vidpipe_media::{Bitrate, TranscodeOptions, VideoSize};
use vidpipe_models::encoding::{DEFAULT_CACHE_CONTROL, DEFAULT_CRF, DEFAULT_PRESET, TARGET_EXTENSION};
use vidpipe_models::{AspectRatio, Visibility};

use crate::error::{PipelineError, PipelineResult};

/// Path value meaning "the source object's own directory".
pub const SOURCE_DIRECTORY: &str = "~";

/// Where published videos are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPlacement {
    /// Next to the source object
    InPlace,
    /// Under a fixed videos root
    Directory(String),
}

/// Pipeline configuration, resolved once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Thumbnail image extension (`IMAGE_TYPE`)
    pub image_type: String,
    /// Screenshot offset in seconds (`TIMESTAMP`)
    pub timestamp_secs: f64,
    /// Thumbnail geometry override; probed from the source when unset
    pub aspect_ratio: Option<AspectRatio>,
    pub video_size: Option<VideoSize>,
    pub video_bitrate: Option<Bitrate>,
    pub audio_bitrate: Option<Bitrate>,
    pub thumbnail_prefix: String,
    pub thumbnail_suffix: String,
    /// Thumbnail directory: empty or `/` is the root, `~` is the source directory
    pub thumbnail_path: String,
    pub video_placement: VideoPlacement,
    /// Only objects in this directory are processed; `~` or `None` accepts all
    pub source_filter: Option<String>,
    /// Extension that needs no re-encode, lowercase
    pub target_extension: String,
    pub visibility: Visibility,
    pub cache_control: Option<String>,
    /// Delete the source after copying an already-MP4 upload elsewhere
    pub delete_source_after_relocate: bool,
    pub crf: Option<u8>,
    pub preset: Option<String>,
    pub faststart: bool,
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl PipelineConfig {
    /// Config with the two mandatory settings and defaults for everything else.
    pub fn new(image_type: impl Into<String>, timestamp_secs: f64) -> Self {
        Self {
            image_type: image_type.into(),
            timestamp_secs,
            aspect_ratio: None,
            video_size: None,
            video_bitrate: None,
            audio_bitrate: None,
            thumbnail_prefix: String::new(),
            thumbnail_suffix: String::new(),
            thumbnail_path: String::new(),
            video_placement: VideoPlacement::InPlace,
            source_filter: None,
            target_extension: TARGET_EXTENSION.to_string(),
            visibility: Visibility::Public,
            cache_control: Some(DEFAULT_CACHE_CONTROL.to_string()),
            delete_source_after_relocate: true,
            crf: Some(DEFAULT_CRF),
            preset: Some(DEFAULT_PRESET.to_string()),
            faststart: true,
            ffmpeg_timeout_secs: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let image_type = lookup("IMAGE_TYPE")
            .map(|v| v.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PipelineError::config_error("IMAGE_TYPE is required"))?;

        let timestamp_secs: f64 = parse_var(&lookup, "TIMESTAMP")?
            .ok_or_else(|| PipelineError::config_error("TIMESTAMP is required"))?;
        if !timestamp_secs.is_finite() || timestamp_secs < 0.0 {
            return Err(PipelineError::config_error(format!(
                "TIMESTAMP must be a non-negative number of seconds, got {}",
                timestamp_secs
            )));
        }

        let mut config = Self::new(image_type, timestamp_secs);

        config.aspect_ratio = parse_var(&lookup, "ASPECT_RATIO")?;
        config.video_size = parse_var(&lookup, "VIDEO_SIZE")?;
        config.video_bitrate = parse_var(&lookup, "VIDEO_BITRATE")?;
        config.audio_bitrate = parse_var(&lookup, "AUDIO_BITRATE")?;
        config.thumbnail_prefix = lookup("THUMBNAIL_PREFIX").unwrap_or_default();
        config.thumbnail_suffix = lookup("THUMBNAIL_SUFFIX").unwrap_or_default();
        config.thumbnail_path = lookup("THUMBNAIL_PATH").unwrap_or_default();
        config.source_filter = lookup("VIDEO_PATH");

        config.video_placement = match lookup("VIDEO_OUTPUT_PATH") {
            Some(path) if path.trim() != SOURCE_DIRECTORY => VideoPlacement::Directory(path),
            _ => VideoPlacement::InPlace,
        };

        if let Some(ext) = non_empty(&lookup, "TARGET_EXTENSION") {
            config.target_extension = ext.trim_start_matches('.').to_ascii_lowercase();
        }
        if let Some(visibility) = parse_var::<Visibility, _>(&lookup, "OUTPUT_VISIBILITY")? {
            config.visibility = visibility;
        }
        if let Some(cache_control) = lookup("CACHE_CONTROL") {
            let cache_control = cache_control.trim().to_string();
            config.cache_control = Some(cache_control).filter(|v| !v.is_empty());
        }
        if let Some(delete) = parse_bool(&lookup, "DELETE_SOURCE_AFTER_RELOCATE")? {
            config.delete_source_after_relocate = delete;
        }

        match non_empty(&lookup, "TRANSCODE_CRF") {
            Some(v) if is_disabled(&v) => config.crf = None,
            Some(v) => {
                let crf: u8 = v.parse().map_err(|_| invalid("TRANSCODE_CRF", &v, "not a number"))?;
                if crf > 51 {
                    return Err(invalid("TRANSCODE_CRF", &v, "must be between 0 and 51"));
                }
                config.crf = Some(crf);
            }
            None => {}
        }
        match non_empty(&lookup, "TRANSCODE_PRESET") {
            Some(v) if is_disabled(&v) => config.preset = None,
            Some(v) => config.preset = Some(v),
            None => {}
        }
        if let Some(faststart) = parse_bool(&lookup, "TRANSCODE_FASTSTART")? {
            config.faststart = faststart;
        }
        config.ffmpeg_timeout_secs = parse_var::<u64, _>(&lookup, "FFMPEG_TIMEOUT_SECS")?.filter(|s| *s > 0);

        Ok(config)
    }

    /// Encoding overrides for the transcoder.
    pub fn transcode_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            size: self.video_size,
            video_bitrate: self.video_bitrate.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
            crf: self.crf,
            preset: self.preset.clone(),
            faststart: self.faststart,
        }
    }
}

/// HTTP server configuration for the trigger endpoint.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root of per-invocation scratch directories
    pub work_dir: PathBuf,
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            work_dir: std::env::temp_dir().join("vidpipe"),
            json_logs: false,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            work_dir: std::env::var("WORK_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }

    pub fn bind_addr(&self) -> PipelineResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| PipelineError::config_error(format!("invalid HOST/PORT: {}", e)))
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> PipelineResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|v| v.parse::<T>().map_err(|e| invalid(key, &v, e)))
        .transpose()
}

fn parse_bool<F>(lookup: &F, key: &str) -> PipelineResult<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, &v, "expected true or false")),
        })
        .transpose()
}

fn is_disabled(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "none" | "off")
}

fn invalid(key: &str, value: &str, reason: impl Display) -> PipelineError {
    PipelineError::config_error(format!("{} has invalid value '{}': {}", key, value, reason))
}
