//! Output naming and cloud path derivation.
//!
//! Everything here is pure: the same file name, source directory and
//! configuration always produce the same [`DerivedPaths`].

use vidpipe_models::split_extension;

use crate::config::{PipelineConfig, VideoPlacement, SOURCE_DIRECTORY};

/// Base name used when an object has no usable file name.
const FALLBACK_BASE_NAME: &str = "video";

/// Names and destinations of the outputs for one source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPaths {
    pub thumbnail_file_name: String,
    pub thumbnail_cloud_path: String,
    pub video_output_file_name: String,
    pub video_cloud_path: String,
    /// Source already has the target extension and is published without re-encoding
    pub already_target_format: bool,
}

/// Derive output names and cloud paths for `file_name` in `source_dir`.
pub fn derive(file_name: &str, source_dir: &str, config: &PipelineConfig) -> DerivedPaths {
    let (base_name, extension) = split_extension(file_name);
    let base_name = if base_name.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        base_name
    };

    let already_target_format = extension
        .map(|ext| ext.eq_ignore_ascii_case(&config.target_extension))
        .unwrap_or(false);

    let thumbnail_file_name = format!(
        "{}{}{}.{}",
        config.thumbnail_prefix, base_name, config.thumbnail_suffix, config.image_type
    );

    let video_output_file_name = if already_target_format {
        file_name.to_string()
    } else {
        format!("{}.{}", base_name, config.target_extension)
    };

    let thumbnail_dir = thumbnail_directory(&config.thumbnail_path, source_dir);
    let video_dir = video_directory(&config.video_placement, source_dir);

    DerivedPaths {
        thumbnail_cloud_path: join_cloud_path(&thumbnail_dir, &thumbnail_file_name),
        video_cloud_path: join_cloud_path(&video_dir, &video_output_file_name),
        thumbnail_file_name,
        video_output_file_name,
        already_target_format,
    }
}

/// Whether an object in `dir` passes the configured directory filter.
pub fn directory_matches(dir: &str, configured: &str) -> bool {
    if configured == SOURCE_DIRECTORY {
        return true;
    }
    if is_root(configured) && dir == "." {
        return true;
    }
    configured.trim_matches('/') == dir.trim_matches('/')
}

/// Thumbnail directory for `configured` (`""`/`/` root, `~` source dir, else literal).
pub fn thumbnail_directory(configured: &str, source_dir: &str) -> String {
    match configured {
        "" | "/" => String::new(),
        SOURCE_DIRECTORY => source_dir.to_string(),
        other => other.to_string(),
    }
}

/// Video directory for `placement`; a configured `""` or `/` is the root.
pub fn video_directory(placement: &VideoPlacement, source_dir: &str) -> String {
    match placement {
        VideoPlacement::InPlace => source_dir.to_string(),
        VideoPlacement::Directory(dir) if is_root(dir) => String::new(),
        VideoPlacement::Directory(dir) => dir.clone(),
    }
}

/// Join a directory and a file name into an object key.
///
/// Always `/`-separated. Empty and `.` segments are dropped and `..` pops a
/// segment without climbing above the bucket root. A leading `/` is kept:
/// `/media/clip.mp4` and `media/clip.mp4` are different objects.
pub fn join_cloud_path(dir: &str, file_name: &str) -> String {
    let mut segments = normalize_segments(dir);
    segments.push(file_name);
    let joined = segments.join("/");
    if dir.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn normalize_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments
}

fn is_root(dir: &str) -> bool {
    matches!(dir, "" | "." | "/")
}
