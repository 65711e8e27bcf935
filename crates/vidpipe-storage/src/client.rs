//! S3-compatible object store client.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{MetadataDirective, ObjectCannedAcl};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectReader, ObjectStore, UploadOptions};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Custom endpoint URL (R2, MinIO, GCS interoperability); AWS when `None`
    pub endpoint_url: Option<String>,
    /// Access key ID; the default credential chain is used when unset
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Region ("auto" for R2)
    pub region: String,
    /// Address buckets as path segments instead of subdomains
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            region: "auto".to_string(),
            force_path_style: true,
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let config = Self {
            endpoint_url: var("STORAGE_ENDPOINT_URL"),
            access_key_id: var("STORAGE_ACCESS_KEY_ID"),
            secret_access_key: var("STORAGE_SECRET_ACCESS_KEY"),
            region: var("STORAGE_REGION").unwrap_or_else(|| "auto".to_string()),
            force_path_style: var("STORAGE_FORCE_PATH_STYLE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
        };

        if config.access_key_id.is_some() != config.secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY must be set together",
            ));
        }

        Ok(config)
    }
}

/// [`ObjectStore`] backed by an S3-compatible API.
///
/// Bucket-agnostic: every call names its bucket, so one client serves every
/// trigger event for the life of the process.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a new client from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                let credentials =
                    Credentials::new(access_key_id, secret_access_key, None, None, "vidpipe");
                Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
            _ => {
                return Err(StorageError::config_error(
                    "access key ID and secret access key must be set together",
                ))
            }
        };

        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = Client::from_conf(builder.force_path_style(config.force_path_style).build());

        Ok(Self { client })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(config).await
    }

}

/// `CopySource` header value: bucket plus URL-encoded key.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn open_read(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        debug!("Opening {}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    StorageError::not_found(format!("{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn upload(
        &self,
        bucket: &str,
        source: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        debug!("Uploading {} to {}/{}", source.display(), bucket, key);

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(&options.content_type)
            .set_cache_control(options.cache_control.clone());

        for (name, value) in &options.metadata {
            request = request.metadata(name, value);
        }

        if options.visibility.is_public() {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(DisplayErrorContext(&e).to_string()))?;

        info!("Uploaded {} to {}/{}", source.display(), bucket, key);
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        from: &str,
        to: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        debug!("Copying {}/{} to {}/{}", bucket, from, bucket, to);

        let mut request = self
            .client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source(bucket, from))
            .key(to)
            .metadata_directive(MetadataDirective::Replace)
            .content_type(&options.content_type)
            .set_cache_control(options.cache_control.clone());

        for (name, value) in &options.metadata {
            request = request.metadata(name, value);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::copy_failed(DisplayErrorContext(&e).to_string()))?;

        info!("Copied {}/{} to {}/{}", bucket, from, bucket, to);
        Ok(())
    }

    async fn make_public(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Making {}/{} public", bucket, key);

        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::acl_failed(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting {}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encodes_key() {
        assert_eq!(
            copy_source("media", "temp/my clip.mp4"),
            "media/temp%2Fmy%20clip.mp4"
        );
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.region, "auto");
        assert!(config.endpoint_url.is_none());
        assert!(config.force_path_style);
    }

    #[tokio::test]
    #[ignore = "requires S3-compatible storage credentials"]
    async fn test_upload_download_delete() {
        let bucket = std::env::var("STORAGE_TEST_BUCKET").expect("STORAGE_TEST_BUCKET not set");
        let store = S3Store::from_env().await.expect("Failed to create storage client");
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("clip.webp");
        tokio::fs::write(&local, b"thumbnail").await.unwrap();
        let key = format!("vidpipe-test/{}.webp", uuid::Uuid::new_v4());

        store
            .upload(&bucket, &local, &key, &UploadOptions::new("image/webp"))
            .await
            .unwrap();
        let fetched = dir.path().join("fetched.webp");
        assert_eq!(store.download(&bucket, &key, &fetched).await.unwrap(), 9);
        store.delete(&bucket, &key).await.unwrap();

        let err = store.download(&bucket, &key, &fetched).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
