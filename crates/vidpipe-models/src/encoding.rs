//! Encoding and publishing defaults.

/// Video codec for normalized output (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Audio codec for normalized output
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor) when no explicit video bitrate is set
pub const DEFAULT_CRF: u8 = 23;

/// Extension of the target container, without the leading dot
pub const TARGET_EXTENSION: &str = "mp4";
/// Content type of published videos
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Cache policy applied to every published output unless overridden
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Content type for a thumbnail with the given image extension.
pub fn image_content_type(extension: &str) -> String {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "svg" => "image/svg+xml".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        other => format!("image/{}", other),
    }
}
