//! In-memory object store and media engine for pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use vidpipe_media::{MediaEngine, MediaError, MediaResult, ThumbnailRequest, TranscodeOptions};
use vidpipe_models::AspectRatio;
use vidpipe_storage::{ObjectReader, ObjectStore, StorageError, StorageResult, UploadOptions};
use vidpipe_worker::{Pipeline, PipelineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Download,
    Upload,
    Copy,
    MakePublic,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Download { key: String, local: PathBuf },
    Upload { key: String, local: PathBuf, options: UploadOptions },
    Copy { from: String, to: String, options: UploadOptions },
    MakePublic { key: String },
    Delete { key: String },
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub options: Option<UploadOptions>,
    pub public: bool,
}

/// Object store backed by a map, recording every call.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<Vec<(StoreOp, Option<String>)>>,
    phantom_downloads: Mutex<bool>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: bytes.to_vec(),
                options: None,
                public: false,
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Fail `op`, on every key or only on `key`.
    pub fn fail(&self, op: StoreOp, key: Option<&str>) {
        self.failures
            .lock()
            .unwrap()
            .push((op, key.map(str::to_string)));
    }

    /// Report downloads as successful without writing the local file.
    pub fn phantom_downloads(&self) {
        *self.phantom_downloads.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.calls()
            .iter()
            .filter(|call| call_op(call) == op)
            .count()
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Upload { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: StoreOp, key: &str) -> StorageResult<()> {
        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(o, k)| *o == op && k.as_deref().map_or(true, |k| k == key));

        if !failing {
            return Ok(());
        }

        Err(match op {
            StoreOp::Download => StorageError::download_failed(format!("injected: {}", key)),
            StoreOp::Upload => StorageError::upload_failed(format!("injected: {}", key)),
            StoreOp::Copy => StorageError::copy_failed(format!("injected: {}", key)),
            StoreOp::MakePublic => StorageError::acl_failed(format!("injected: {}", key)),
            StoreOp::Delete => StorageError::delete_failed(format!("injected: {}", key)),
        })
    }
}

fn call_op(call: &StoreCall) -> StoreOp {
    match call {
        StoreCall::Download { .. } => StoreOp::Download,
        StoreCall::Upload { .. } => StoreOp::Upload,
        StoreCall::Copy { .. } => StoreOp::Copy,
        StoreCall::MakePublic { .. } => StoreOp::MakePublic,
        StoreCall::Delete { .. } => StoreOp::Delete,
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn open_read(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        let object = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))?;
        Ok(Box::pin(Cursor::new(object.bytes)))
    }

    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        self.record(StoreCall::Download {
            key: key.to_string(),
            local: destination.to_path_buf(),
        });
        self.check(StoreOp::Download, key)?;

        let object = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))?;

        if *self.phantom_downloads.lock().unwrap() {
            return Ok(0);
        }

        tokio::fs::write(destination, &object.bytes).await?;
        Ok(object.bytes.len() as u64)
    }

    async fn upload(
        &self,
        bucket: &str,
        source: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        self.record(StoreCall::Upload {
            key: key.to_string(),
            local: source.to_path_buf(),
            options: options.clone(),
        });
        self.check(StoreOp::Upload, key)?;

        let bytes = tokio::fs::read(source).await?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                options: Some(options.clone()),
                public: options.visibility.is_public(),
            },
        );
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        self.record(StoreCall::Copy {
            from: from.to_string(),
            to: to.to_string(),
            options: options.clone(),
        });
        self.check(StoreOp::Copy, from)?;

        let object = self
            .get(bucket, from)
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, from)))?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), to.to_string()),
            StoredObject {
                bytes: object.bytes,
                options: Some(options.clone()),
                public: false,
            },
        );
        Ok(())
    }

    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(StoreCall::MakePublic {
            key: key.to_string(),
        });
        self.check(StoreOp::MakePublic, key)?;

        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", bucket, key)))?;
        object.public = true;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(StoreCall::Delete {
            key: key.to_string(),
        });
        self.check(StoreOp::Delete, key)?;

        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum EngineCall {
    Probe(PathBuf),
    Thumbnail(ThumbnailRequest),
    Transcode {
        input: PathBuf,
        output: PathBuf,
        options: TranscodeOptions,
    },
}

/// Media engine that writes marker files instead of running FFmpeg.
#[derive(Default)]
pub struct FakeEngine {
    pub probed_ratio: Option<AspectRatio>,
    pub fail_thumbnail: bool,
    pub fail_transcode: bool,
    /// Report success without writing the thumbnail
    pub skip_thumbnail_output: bool,
    /// Report success without writing the transcoded video
    pub skip_transcode_output: bool,
    pub(crate) calls: Mutex<Vec<EngineCall>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn thumbnail_requests(&self) -> Vec<ThumbnailRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Thumbnail(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn transcode_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Transcode { .. }))
            .count()
    }

    pub fn probe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Probe(_)))
            .count()
    }

    /// Every local path the engine read or wrote.
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .flat_map(|call| match call {
                EngineCall::Probe(path) => vec![path],
                EngineCall::Thumbnail(request) => vec![request.video, request.output],
                EngineCall::Transcode { input, output, .. } => vec![input, output],
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn probe_aspect_ratio(&self, video: &Path) -> Option<AspectRatio> {
        self.record(EngineCall::Probe(video.to_path_buf()));
        self.probed_ratio
    }

    async fn extract_thumbnail(&self, request: &ThumbnailRequest) -> MediaResult<PathBuf> {
        self.record(EngineCall::Thumbnail(request.clone()));

        if self.fail_thumbnail {
            return Err(MediaError::ffmpeg_failed("injected thumbnail failure", None, Some(1)));
        }
        if !self.skip_thumbnail_output {
            tokio::fs::write(&request.output, b"thumbnail").await?;
        }
        Ok(request.output.clone())
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> MediaResult<PathBuf> {
        self.record(EngineCall::Transcode {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            options: options.clone(),
        });

        if self.fail_transcode {
            // A crashed encoder leaves a partial file behind
            tokio::fs::write(output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed("injected transcode failure", None, Some(1)));
        }
        if !self.skip_transcode_output {
            tokio::fs::write(output, b"transcoded").await?;
        }
        Ok(output.to_path_buf())
    }
}

pub const BUCKET: &str = "media-bucket";

/// Pipeline wired to fakes, with its scratch root.
pub struct Harness {
    pub pipeline: Pipeline,
    pub store: Arc<FakeStore>,
    pub engine: Arc<FakeEngine>,
    pub work_dir: TempDir,
}

impl Harness {
    pub fn new(config: PipelineConfig, engine: FakeEngine) -> Self {
        let store = FakeStore::new();
        let engine = Arc::new(engine);
        let work_dir = TempDir::new().unwrap();

        let pipeline = Pipeline::new(
            store.clone(),
            engine.clone(),
            Arc::new(config),
            work_dir.path(),
        );

        Self {
            pipeline,
            store,
            engine,
            work_dir,
        }
    }

    /// Nothing left behind under the scratch root.
    pub fn assert_scratch_empty(&self) {
        let leftovers: Vec<PathBuf> = std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert!(leftovers.is_empty(), "leftover scratch entries: {:?}", leftovers);

        for path in self.engine.touched_paths() {
            assert!(!path.exists(), "temp file survived: {}", path.display());
        }
    }
}

pub fn webp_config() -> PipelineConfig {
    PipelineConfig::new("webp", 1.0)
}
