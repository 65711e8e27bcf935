//! Object store abstraction.
//!
//! The pipeline depends on [`ObjectStore`] only; the S3 client in
//! [`crate::client`] is the production backend.

use std::collections::BTreeMap;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;
use vidpipe_models::Visibility;

use crate::error::StorageResult;

/// Metadata key holding the download token of a private object.
pub const DOWNLOAD_TOKEN_METADATA_KEY: &str = "firebaseStorageDownloadTokens";

/// Streaming body of a stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata applied to an uploaded or copied object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub visibility: Visibility,
    /// Custom object metadata
    pub metadata: BTreeMap<String, String>,
}

impl UploadOptions {
    /// Public object with the given content type and no cache policy.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: None,
            visibility: Visibility::Public,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_cache_control(mut self, cache_control: Option<String>) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Set visibility. Private objects get a fresh download token.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        match visibility {
            Visibility::Private => {
                self.metadata.insert(
                    DOWNLOAD_TOKEN_METADATA_KEY.to_string(),
                    Uuid::new_v4().to_string(),
                );
            }
            Visibility::Public => {
                self.metadata.remove(DOWNLOAD_TOKEN_METADATA_KEY);
            }
        }
        self
    }

    /// Download token of a private object.
    pub fn download_token(&self) -> Option<&str> {
        self.metadata
            .get(DOWNLOAD_TOKEN_METADATA_KEY)
            .map(String::as_str)
    }
}

/// Operations on named blobs within a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a streaming read of an object.
    async fn open_read(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader>;

    /// Download an object to a local file, returning the bytes written.
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        let mut reader = self.open_read(bucket, key).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        debug!("Downloaded {} bytes from {}/{} to {}", written, bucket, key, destination.display());
        Ok(written)
    }

    /// Upload a local file to `key`.
    async fn upload(
        &self,
        bucket: &str,
        source: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()>;

    /// Server-side copy of `from` to `to`, replacing metadata with `options`.
    async fn copy(&self, bucket: &str, from: &str, to: &str, options: &UploadOptions)
        -> StorageResult<()>;

    /// Make an existing object readable by anyone.
    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;
}
