//! Per-invocation scratch state.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vidpipe_media::non_aliasing_output;

use crate::paths::DerivedPaths;

/// Local file name used when the object name has no usable final segment.
const FALLBACK_SOURCE_NAME: &str = "source";

/// Prefix for a local thumbnail whose name would collide with another temp file.
const THUMBNAIL_COLLISION_PREFIX: &str = "thumb_";

/// State of one invocation: derived destinations plus the local temp files
/// it has allocated inside its private scratch directory.
///
/// Every assigned path is deleted exactly once by [`WorkItem::cleanup`]. If
/// the item is dropped without cleanup (a cancelled invocation), `Drop` does
/// a blocking best-effort removal instead.
#[derive(Debug)]
pub struct WorkItem {
    scratch_dir: PathBuf,
    paths: DerivedPaths,
    source: Option<PathBuf>,
    thumbnail: Option<PathBuf>,
    transcoded: Option<PathBuf>,
    cleaned_up: bool,
}

impl WorkItem {
    pub fn new(scratch_dir: impl Into<PathBuf>, paths: DerivedPaths) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            paths,
            source: None,
            thumbnail: None,
            transcoded: None,
            cleaned_up: false,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn paths(&self) -> &DerivedPaths {
        &self.paths
    }

    /// Allocate the local path the source is downloaded to.
    pub fn assign_source(&mut self, file_name: &str) -> PathBuf {
        let path = self.scratch_dir.join(local_file_name(file_name));
        self.source = Some(path.clone());
        path
    }

    /// Allocate the local transcoder output; never aliases the source.
    pub fn assign_transcoded(&mut self) -> PathBuf {
        let requested = self
            .scratch_dir
            .join(local_file_name(&self.paths.video_output_file_name));
        let path = match &self.source {
            Some(source) => non_aliasing_output(source, &requested),
            None => requested,
        };
        self.transcoded = Some(path.clone());
        path
    }

    /// Allocate the local thumbnail path, renamed if it would overwrite another temp file.
    pub fn assign_thumbnail(&mut self) -> PathBuf {
        let file_name = local_file_name(&self.paths.thumbnail_file_name);
        let mut path = self.scratch_dir.join(&file_name);
        if self.is_assigned(&path) {
            path = self
                .scratch_dir
                .join(format!("{}{}", THUMBNAIL_COLLISION_PREFIX, file_name));
        }
        self.thumbnail = Some(path.clone());
        path
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn thumbnail_path(&self) -> Option<&Path> {
        self.thumbnail.as_deref()
    }

    pub fn transcoded_path(&self) -> Option<&Path> {
        self.transcoded.as_deref()
    }

    /// Local file published as the video: the source itself when it is
    /// already in the target format, else the transcoder output.
    pub fn video_artifact(&self) -> Option<&Path> {
        if self.paths.already_target_format {
            self.source_path()
        } else {
            self.transcoded_path()
        }
    }

    /// Every temp path assigned so far.
    pub fn temp_paths(&self) -> Vec<&Path> {
        [&self.source, &self.thumbnail, &self.transcoded]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }

    /// Delete every assigned temp file, then the scratch directory if empty.
    ///
    /// Failures are logged and ignored. Returns the number of files removed.
    pub async fn cleanup(&mut self) -> usize {
        let mut removed = 0;

        for path in self.take_paths() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed temp file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }

        if let Err(e) = tokio::fs::remove_dir(&self.scratch_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Scratch dir {} not removed: {}", self.scratch_dir.display(), e);
            }
        }

        self.cleaned_up = true;
        removed
    }

    fn take_paths(&mut self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(3);
        for path in [self.source.take(), self.thumbnail.take(), self.transcoded.take()]
            .into_iter()
            .flatten()
        {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    fn is_assigned(&self, path: &Path) -> bool {
        self.temp_paths().contains(&path)
    }
}

impl Drop for WorkItem {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        for path in self.take_paths() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", path.display(), e);
                }
            }
        }
        let _ = std::fs::remove_dir(&self.scratch_dir);
    }
}

/// File name safe to join onto the scratch directory.
fn local_file_name(name: &str) -> String {
    match name {
        "" | "." | ".." => FALLBACK_SOURCE_NAME.to_string(),
        other => other.replace(|c: char| c == '/' || c == '\\', "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(thumbnail: &str, video: &str, already_target_format: bool) -> DerivedPaths {
        DerivedPaths {
            thumbnail_file_name: thumbnail.to_string(),
            thumbnail_cloud_path: thumbnail.to_string(),
            video_output_file_name: video.to_string(),
            video_cloud_path: video.to_string(),
            already_target_format,
        }
    }

    #[test]
    fn test_assigned_paths_stay_in_scratch_dir() {
        let mut item = WorkItem::new("/tmp/work/abc", paths("clip.webp", "clip.mp4", false));

        assert_eq!(item.assign_source(".."), PathBuf::from("/tmp/work/abc/source"));
        assert_eq!(item.assign_transcoded(), PathBuf::from("/tmp/work/abc/clip.mp4"));
        assert_eq!(item.assign_thumbnail(), PathBuf::from("/tmp/work/abc/clip.webp"));
        assert_eq!(item.temp_paths().len(), 3);
    }

    #[test]
    fn test_thumbnail_never_overwrites_source() {
        let mut item = WorkItem::new("/tmp/work/abc", paths("clip.webp", "clip.mp4", false));

        item.assign_source("clip.webp");
        assert_eq!(item.assign_thumbnail(), PathBuf::from("/tmp/work/abc/thumb_clip.webp"));
    }

    #[test]
    fn test_transcoded_never_aliases_source() {
        let mut item = WorkItem::new("/tmp/work/abc", paths("clip.webp", "clip.mp4", false));

        item.assign_source("clip.mp4");
        assert_eq!(
            item.assign_transcoded(),
            PathBuf::from("/tmp/work/abc/clip_transcoded.mp4")
        );
    }

    #[test]
    fn test_video_artifact() {
        let mut item = WorkItem::new("/w", paths("clip.webp", "clip.mp4", true));
        item.assign_source("clip.mp4");
        assert_eq!(item.video_artifact(), Some(Path::new("/w/clip.mp4")));

        let mut item = WorkItem::new("/w", paths("clip.webp", "clip.mp4", false));
        item.assign_source("clip.mov");
        assert_eq!(item.video_artifact(), None);
        item.assign_transcoded();
        assert_eq!(item.video_artifact(), Some(Path::new("/w/clip.mp4")));
    }

    #[tokio::test]
    async fn test_cleanup_removes_files_and_dir() {
        let root = TempDir::new().unwrap();
        let scratch = root.path().join("invocation");
        tokio::fs::create_dir_all(&scratch).await.unwrap();

        let mut item = WorkItem::new(&scratch, paths("clip.webp", "clip.mp4", false));
        let source = item.assign_source("clip.mov");
        let thumbnail = item.assign_thumbnail();
        item.assign_transcoded();

        tokio::fs::write(&source, b"src").await.unwrap();
        tokio::fs::write(&thumbnail, b"img").await.unwrap();

        assert_eq!(item.cleanup().await, 2);
        assert!(!source.exists());
        assert!(!thumbnail.exists());
        assert!(!scratch.exists());
        assert!(item.temp_paths().is_empty());

        // Second call has nothing left to delete
        assert_eq!(item.cleanup().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_foreign_files() {
        let root = TempDir::new().unwrap();
        let scratch = root.path().join("invocation");
        tokio::fs::create_dir_all(&scratch).await.unwrap();
        let foreign = scratch.join("other.txt");
        tokio::fs::write(&foreign, b"keep").await.unwrap();

        let mut item = WorkItem::new(&scratch, paths("clip.webp", "clip.mp4", false));
        let source = item.assign_source("clip.mov");
        tokio::fs::write(&source, b"src").await.unwrap();

        assert_eq!(item.cleanup().await, 1);
        assert!(foreign.exists());
        assert!(scratch.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = TempDir::new().unwrap();
        let scratch = root.path().join("invocation");
        std::fs::create_dir_all(&scratch).unwrap();

        let source = {
            let mut item = WorkItem::new(&scratch, paths("clip.webp", "clip.mp4", false));
            let source = item.assign_source("clip.mov");
            std::fs::write(&source, b"src").unwrap();
            source
        };

        assert!(!source.exists());
        assert!(!scratch.exists());
    }
}
