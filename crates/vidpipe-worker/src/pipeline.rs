//! Per-event pipeline driver.
//!
//! One call to [`Pipeline::handle`] takes a finalized object through
//! validate → download → {thumbnail, transcode} → verify →
//! {upload thumbnail, publish video} → finalize source, and always removes
//! its local temp files afterwards. Failures are logged and reported as
//! [`Outcome::Failed`]; nothing is retried.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, Instrument};
use uuid::Uuid;
use vidpipe_media::{MediaEngine, ThumbnailRequest};
use vidpipe_models::encoding::{image_content_type, VIDEO_CONTENT_TYPE};
use vidpipe_models::SourceObject;
use vidpipe_storage::{ObjectStore, UploadOptions};

use crate::config::PipelineConfig;
use crate::error::{Artifact, PipelineError, PipelineResult};
use crate::logging::InvocationLogger;
use crate::metrics;
use crate::paths::{self, DerivedPaths};
use crate::work_item::WorkItem;

/// Why an event was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotVideo { content_type: String },
    OutsideSourcePath { directory: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotVideo { content_type } => {
                write!(f, "content type '{}' is not a video", content_type)
            }
            SkipReason::OutsideSourcePath { directory } => {
                write!(f, "directory '{}' does not match the source path filter", directory)
            }
        }
    }
}

/// What a successful invocation published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub thumbnail_path: String,
    pub video_path: String,
    /// Video was re-encoded rather than copied
    pub transcoded: bool,
    pub source_deleted: bool,
}

/// Result of one invocation. Never an `Err`: failures are terminal states.
#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    Completed(PublishReport),
    Failed(PipelineError),
}

impl Outcome {
    /// Label used for logs and the outcome metric.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped(_) => "skipped",
            Outcome::Completed(_) => "completed",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

/// How the video reached its destination.
enum VideoPublish {
    Uploaded,
    /// Already in target format; `copied` is false when the destination is the source
    Relocated { copied: bool },
}

/// The transcode-and-publish pipeline.
///
/// Cheap to clone; the store, engine and config are shared immutably.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
    config: Arc<PipelineConfig>,
    work_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn MediaEngine>,
        config: Arc<PipelineConfig>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine,
            config,
            work_dir: work_dir.into(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decide whether an object should be processed at all.
    pub fn validate(&self, source: &SourceObject) -> Result<(), SkipReason> {
        if !source.is_video() {
            return Err(SkipReason::NotVideo {
                content_type: source.content_type.clone(),
            });
        }

        if let Some(filter) = &self.config.source_filter {
            if !paths::directory_matches(&source.directory, filter) {
                return Err(SkipReason::OutsideSourcePath {
                    directory: source.directory.clone(),
                });
            }
        }

        Ok(())
    }

    /// Run one invocation to completion.
    pub async fn handle(&self, source: &SourceObject) -> Outcome {
        let logger = InvocationLogger::new(Uuid::new_v4().to_string(), source);
        let span = logger.create_span();
        let started = Instant::now();

        let outcome = self.run(source, &logger).instrument(span).await;

        metrics::record_invocation(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn run(&self, source: &SourceObject, logger: &InvocationLogger) -> Outcome {
        if let Err(reason) = self.validate(source) {
            logger.log_skipped(&reason.to_string());
            return Outcome::Skipped(reason);
        }

        logger.log_start(&format!("{} ({})", source.file_name, source.content_type));

        let derived = paths::derive(&source.file_name, &source.directory, &self.config);
        let mut item = WorkItem::new(self.work_dir.join(logger.invocation_id()), derived);

        let result = self.process(source, &mut item, logger).await;
        let removed = item.cleanup().await;
        debug!("Removed {} temp files", removed);

        match result {
            Ok(report) => {
                logger.log_completion(&format!(
                    "thumbnail={} video={} transcoded={} source_deleted={}",
                    report.thumbnail_path, report.video_path, report.transcoded, report.source_deleted
                ));
                Outcome::Completed(report)
            }
            Err(e) => {
                logger.log_error(e.stage(), &e.to_string());
                Outcome::Failed(e)
            }
        }
    }

    async fn process(
        &self,
        source: &SourceObject,
        item: &mut WorkItem,
        logger: &InvocationLogger,
    ) -> PipelineResult<PublishReport> {
        // Received -> Downloaded
        tokio::fs::create_dir_all(item.scratch_dir()).await.map_err(|e| {
            PipelineError::download(format!(
                "cannot create scratch dir {}: {}",
                item.scratch_dir().display(),
                e
            ))
        })?;
        let local_source = item.assign_source(&source.file_name);

        self.store
            .download(&source.bucket, &source.name, &local_source)
            .await
            .map_err(|e| PipelineError::download(e.to_string()))?;

        if !is_file(&local_source).await {
            return Err(PipelineError::download(format!(
                "{} missing after download",
                local_source.display()
            )));
        }
        logger.log_progress(&format!("downloaded to {}", local_source.display()));

        // Downloaded -> Processed
        let paths = item.paths().clone();
        let transcoded_local = (!paths.already_target_format).then(|| item.assign_transcoded());
        let thumbnail_local = item.assign_thumbnail();

        let (thumbnail_result, video_result) = tokio::join!(
            self.make_thumbnail(&local_source, &thumbnail_local),
            self.make_video(&local_source, transcoded_local.as_deref()),
        );

        match (thumbnail_result, video_result) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) | (Ok(()), Err(e)) => return Err(e),
            (Err(first), Err(second)) => {
                logger.log_warning(&format!("{} also failed: {}", second.stage(), second));
                return Err(first);
            }
        }
        logger.log_progress("thumbnail and video ready");

        // Processed -> Verified
        let video_local = item
            .video_artifact()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| local_source.clone());
        let thumbnail_size = verify(Artifact::Thumbnail, &thumbnail_local).await?;
        let video_size = verify(Artifact::Video, &video_local).await?;

        // Verified -> Uploaded
        let (thumbnail_upload, video_upload) = tokio::join!(
            self.upload_thumbnail(source, &thumbnail_local, thumbnail_size, &paths),
            self.publish_video(source, &video_local, video_size, &paths),
        );

        let video_publish = match (thumbnail_upload, video_upload) {
            (Ok(()), Ok(publish)) => publish,
            (Err(e), Ok(_)) | (Ok(()), Err(e)) => return Err(e),
            (Err(first), Err(second)) => {
                logger.log_warning(&format!("{} also failed: {}", second.stage(), second));
                return Err(first);
            }
        };
        logger.log_progress("outputs published");

        // Uploaded -> Finalized
        let source_deleted = self.finalize_source(source, &paths, &video_publish).await?;

        Ok(PublishReport {
            thumbnail_path: paths.thumbnail_cloud_path,
            video_path: paths.video_cloud_path,
            transcoded: matches!(video_publish, VideoPublish::Uploaded),
            source_deleted,
        })
    }

    async fn make_thumbnail(&self, video: &Path, output: &Path) -> PipelineResult<()> {
        let aspect_ratio = match self.config.aspect_ratio {
            Some(ratio) => Some(ratio),
            None => self.engine.probe_aspect_ratio(video).await,
        };

        let request = ThumbnailRequest::new(video, output, self.config.timestamp_secs)
            .with_aspect_ratio(aspect_ratio);

        self.engine
            .extract_thumbnail(&request)
            .await
            .map_err(PipelineError::Extraction)?;
        Ok(())
    }

    /// Transcode into `output`; a no-op when the source is already the video artifact.
    async fn make_video(&self, input: &Path, output: Option<&Path>) -> PipelineResult<()> {
        let Some(output) = output else {
            return Ok(());
        };

        self.engine
            .transcode(input, output, &self.config.transcode_options())
            .await
            .map_err(PipelineError::Transcode)?;
        Ok(())
    }

    fn upload_options(&self, content_type: impl Into<String>) -> UploadOptions {
        UploadOptions::new(content_type)
            .with_cache_control(self.config.cache_control.clone())
            .with_visibility(self.config.visibility)
    }

    async fn upload_thumbnail(
        &self,
        source: &SourceObject,
        local: &Path,
        size: u64,
        paths: &DerivedPaths,
    ) -> PipelineResult<()> {
        let options = self.upload_options(image_content_type(&self.config.image_type));

        self.store
            .upload(&source.bucket, local, &paths.thumbnail_cloud_path, &options)
            .await
            .map_err(|e| PipelineError::upload(Artifact::Thumbnail, e))?;

        metrics::record_bytes_uploaded(size);
        Ok(())
    }

    async fn publish_video(
        &self,
        source: &SourceObject,
        local: &Path,
        size: u64,
        paths: &DerivedPaths,
    ) -> PipelineResult<VideoPublish> {
        let options = self.upload_options(VIDEO_CONTENT_TYPE);

        if !paths.already_target_format {
            self.store
                .upload(&source.bucket, local, &paths.video_cloud_path, &options)
                .await
                .map_err(|e| PipelineError::upload(Artifact::Video, e))?;

            metrics::record_bytes_uploaded(size);
            return Ok(VideoPublish::Uploaded);
        }

        let copied = !same_object(&paths.video_cloud_path, &source.name);
        if copied {
            self.store
                .copy(&source.bucket, &source.name, &paths.video_cloud_path, &options)
                .await
                .map_err(PipelineError::Finalize)?;
        }

        if options.visibility.is_public() {
            self.store
                .make_public(&source.bucket, &paths.video_cloud_path)
                .await
                .map_err(PipelineError::Finalize)?;
        }

        Ok(VideoPublish::Relocated { copied })
    }

    /// Delete the source once every output is durable. Returns whether it was deleted.
    async fn finalize_source(
        &self,
        source: &SourceObject,
        paths: &DerivedPaths,
        publish: &VideoPublish,
    ) -> PipelineResult<bool> {
        let published_over_source = same_object(&paths.video_cloud_path, &source.name)
            || same_object(&paths.thumbnail_cloud_path, &source.name);

        let delete = match publish {
            VideoPublish::Uploaded => true,
            VideoPublish::Relocated { copied } => *copied && self.config.delete_source_after_relocate,
        };

        if !delete || published_over_source {
            debug!("Keeping source {}", source.name);
            return Ok(false);
        }

        self.store
            .delete(&source.bucket, &source.name)
            .await
            .map_err(PipelineError::Finalize)?;
        Ok(true)
    }
}

/// Size of an expected local output, or a verification error naming it.
async fn verify(artifact: Artifact, path: &Path) -> PipelineResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        _ => Err(PipelineError::Verification {
            artifact,
            path: path.to_path_buf(),
        }),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Keys are compared exactly: `/a/b` and `a//b` are not `a/b`.
fn same_object(a: &str, b: &str) -> bool {
    a == b
}
