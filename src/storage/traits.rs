//! Storage abstraction the publisher and the janitor talk to.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Link issuance failed: {0}")]
    LinkFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Remote object store holding published files.
///
/// Folders are looked up by name; object ids are opaque strings returned by
/// [`ObjectStorage::upload`] and accepted by the other calls.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn folder_exists(&self, folder: &str) -> StorageResult<bool>;

    async fn create_folder(&self, folder: &str) -> StorageResult<()>;

    /// Upload a local file into `folder` and return its object id
    async fn upload(
        &self,
        folder: &str,
        local_path: &Path,
        file_name: &str,
    ) -> StorageResult<String>;

    /// Publicly reachable link, valid for `ttl`
    async fn public_link(&self, object_id: &str, ttl: Duration) -> StorageResult<String>;

    async fn delete(&self, object_id: &str) -> StorageResult<()>;
}
