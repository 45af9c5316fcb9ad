use super::traits::{ObjectStorage, StorageError, StorageResult};
use crate::config::StorageSettings;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload};
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// S3-compatible bucket. Folders are key prefixes marked by a `.keep` object.
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Builds the client from explicit settings layered over `AWS_*` env vars.
    pub fn new(settings: &StorageSettings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(settings.bucket.clone())
            .with_region(settings.region.clone());

        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            builder = builder
                .with_access_key_id(key_id.clone())
                .with_secret_access_key(secret.clone());
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            store,
            bucket: settings.bucket.clone(),
        })
    }

    fn folder_marker(folder: &str) -> ObjectPath {
        ObjectPath::from(format!("{folder}/.keep"))
    }
}

/// Object key for an upload; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn object_key(folder: &str, file_name: &str) -> String {
    let safe_name: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{folder}/{}_{safe_name}", Uuid::new_v4().simple())
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn folder_exists(&self, folder: &str) -> StorageResult<bool> {
        match self.store.head(&Self::folder_marker(folder)).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn create_folder(&self, folder: &str) -> StorageResult<()> {
        self.store
            .put(&Self::folder_marker(folder), PutPayload::from(Bytes::new()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        tracing::info!(bucket = %self.bucket, folder, "Created staging folder");
        Ok(())
    }

    async fn upload(
        &self,
        folder: &str,
        local_path: &Path,
        file_name: &str,
    ) -> StorageResult<String> {
        let data = tokio::fs::read(local_path).await?;
        let size = data.len() as u64;
        let key = object_key(folder, file_name);
        let location = ObjectPath::from(key.clone());
        let start = Instant::now();

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(key)
    }

    async fn public_link(&self, object_id: &str, ttl: Duration) -> StorageResult<String> {
        let url = self
            .store
            .signed_url(Method::GET, &ObjectPath::from(object_id), ttl)
            .await
            .map_err(|e| StorageError::LinkFailed(e.to_string()))?;

        Ok(url.to_string())
    }

    async fn delete(&self, object_id: &str) -> StorageResult<()> {
        self.store
            .delete(&ObjectPath::from(object_id))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %object_id,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(bucket = %self.bucket, key = %object_id, "S3 delete successful");
        Ok(())
    }
}
