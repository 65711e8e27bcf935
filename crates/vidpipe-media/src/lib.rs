//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe geometry lookup (aspect ratio) for thumbnails
//! - Single-frame thumbnail extraction
//! - MP4 (H.264/AAC) normalization with optional size/bitrate overrides
//! - A `MediaEngine` trait so callers can swap the FFmpeg backend out

pub mod command;
pub mod engine;
pub mod error;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use probe::probe_aspect_ratio;
pub use progress::FfmpegProgress;
pub use thumbnail::{extract_thumbnail, ThumbnailRequest};
pub use transcode::{non_aliasing_output, transcode, Bitrate, TranscodeOptions, VideoSize};
pub use vidpipe_models::AspectRatio;
