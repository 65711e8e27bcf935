//! Object storage client.
//!
//! This crate provides:
//! - The `ObjectStore` trait the pipeline consumes (download, upload, copy,
//!   make-public, delete, streaming reads)
//! - Upload options carrying content type, cache policy and visibility
//! - An S3-compatible implementation built on the AWS SDK

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Store, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use store::{ObjectReader, ObjectStore, UploadOptions, DOWNLOAD_TOKEN_METADATA_KEY};
