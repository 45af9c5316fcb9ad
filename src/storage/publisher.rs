use super::traits::{ObjectStorage, StorageError};
use crate::clock::Clock;
use crate::db::{Store, StoreError, UploadedFileRecord};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("staging folder unavailable: {0}")]
    Folder(#[source] StorageError),

    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),

    #[error("link issuance failed: {0}")]
    Link(#[source] StorageError),

    #[error("failed to record upload: {0}")]
    Record(#[source] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub object_id: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Uploads fetched files into the staging folder and records them for expiry.
pub struct Publisher {
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    staging_folder: String,
    ttl: Duration,
}

impl Publisher {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        staging_folder: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            store,
            clock,
            staging_folder: staging_folder.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn ensure_staging_folder(&self) -> Result<(), StorageError> {
        if !self.storage.folder_exists(&self.staging_folder).await? {
            self.storage.create_folder(&self.staging_folder).await?;
        }
        Ok(())
    }

    /// An unrecorded object would never be reclaimed by the janitor.
    async fn discard(&self, object_id: &str) {
        if let Err(e) = self.storage.delete(object_id).await {
            warn!(object_id, error = %e, "Failed to roll back upload");
        }
    }

    /// Nothing is recorded unless every step succeeds.
    pub async fn publish(
        &self,
        local_path: &Path,
        file_name: &str,
    ) -> Result<PublishResult, PublishError> {
        self.ensure_staging_folder()
            .await
            .map_err(PublishError::Folder)?;

        let object_id = self
            .storage
            .upload(&self.staging_folder, local_path, file_name)
            .await
            .map_err(PublishError::Upload)?;

        let link = match self.storage.public_link(&object_id, self.ttl).await {
            Ok(link) => link,
            Err(e) => {
                self.discard(&object_id).await;
                return Err(PublishError::Link(e));
            }
        };

        let uploaded_at = self.clock.now();
        let expires_at = uploaded_at + chrono::Duration::seconds(self.ttl.as_secs() as i64);

        let record = UploadedFileRecord {
            object_id: object_id.clone(),
            local_path: local_path.to_path_buf(),
            link: link.clone(),
            uploaded_at,
            expires_at,
        };

        if let Err(e) = self.store.insert_upload(&record) {
            error!(object_id = %object_id, error = %e, "Failed to record upload");
            self.discard(&object_id).await;
            return Err(PublishError::Record(e));
        }

        info!(
            object_id = %object_id,
            file = file_name,
            expires_at = %expires_at,
            "Published file"
        );

        Ok(PublishResult {
            object_id,
            link,
            uploaded_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::db::testing::{failing_store, temp_store};
    use crate::storage::testing::FakeStorage;

    fn publisher(storage: Arc<FakeStorage>, store: Arc<dyn Store>) -> Publisher {
        Publisher::new(
            storage,
            store,
            Arc::new(ManualClock::at(1_700_000_000)),
            "staging",
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_publish_records_exact_expiration() {
        let (dir, store) = temp_store();
        let store = Arc::new(store);
        let storage = Arc::new(FakeStorage::new());
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let result = publisher(storage.clone(), store.clone())
            .publish(&file, "clip.mp4")
            .await
            .unwrap();

        assert_eq!(
            result.expires_at - result.uploaded_at,
            chrono::Duration::seconds(3600)
        );
        assert!(result.object_id.starts_with("staging/"));
        assert!(storage.contains(&result.object_id));

        let records = store.all_uploads().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].object_id, result.object_id);
        assert_eq!(records[0].local_path, file);
        assert_eq!(records[0].link, result.link);
        assert_eq!(
            records[0].expires_at,
            records[0].uploaded_at + chrono::Duration::seconds(3600)
        );
    }

    #[tokio::test]
    async fn test_staging_folder_created_once() {
        let (dir, store) = temp_store();
        let storage = Arc::new(FakeStorage::new());
        let publisher = publisher(storage.clone(), Arc::new(store));
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        publisher.publish(&file, "clip.mp4").await.unwrap();
        publisher.publish(&file, "clip.mp4").await.unwrap();

        assert_eq!(storage.folders_created(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_records_nothing() {
        let (dir, store) = temp_store();
        let store = Arc::new(store);
        let storage = Arc::new(FakeStorage::new());
        storage.fail_uploads();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let err = publisher(storage, store.clone())
            .publish(&file, "clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Upload(_)));
        assert!(store.all_uploads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_failure_records_nothing() {
        let (dir, store) = temp_store();
        let store = Arc::new(store);
        let storage = Arc::new(FakeStorage::new());
        storage.fail_links();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let err = publisher(storage.clone(), store.clone())
            .publish(&file, "clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Link(_)));
        assert!(store.all_uploads().unwrap().is_empty());
        // The uploaded object is rolled back
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_folder_failure_skips_upload() {
        let (dir, store) = temp_store();
        let storage = Arc::new(FakeStorage::new());
        storage.fail_folders();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let err = publisher(storage.clone(), Arc::new(store))
            .publish(&file, "clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Folder(_)));
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_record_failure_rolls_back_upload() {
        let (dir, store) = failing_store();
        store.fail_insert_upload(true);
        let store = Arc::new(store);
        let storage = Arc::new(FakeStorage::new());
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let err = publisher(storage.clone(), store.clone())
            .publish(&file, "clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Record(_)));
        assert_eq!(storage.object_count(), 0);
        assert!(store.all_uploads().unwrap().is_empty());
        assert!(file.exists());
    }
}
