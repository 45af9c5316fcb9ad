//! In-memory [`ObjectStorage`] with switchable failures.

use super::traits::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeStorage {
    folders: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    broken_deletes: Mutex<HashSet<String>>,
    folders_created: AtomicUsize,
    uploads: AtomicUsize,
    fail_folders: AtomicBool,
    fail_uploads: AtomicBool,
    fail_links: AtomicBool,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_folders(&self) {
        self.fail_folders.store(true, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn fail_links(&self) {
        self.fail_links.store(true, Ordering::SeqCst);
    }

    /// Deleting `object_id` will fail from now on.
    pub fn fail_delete_of(&self, object_id: &str) {
        self.broken_deletes
            .lock()
            .unwrap()
            .insert(object_id.to_string());
    }

    pub fn insert_object(&self, object_id: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(object_id.to_string(), Vec::new());
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(object_id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn folders_created(&self) -> usize {
        self.folders_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn folder_exists(&self, folder: &str) -> StorageResult<bool> {
        if self.fail_folders.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("folder lookup refused".to_string()));
        }
        Ok(self.folders.lock().unwrap().contains(folder))
    }

    async fn create_folder(&self, folder: &str) -> StorageResult<()> {
        self.folders.lock().unwrap().insert(folder.to_string());
        self.folders_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload(
        &self,
        folder: &str,
        local_path: &Path,
        file_name: &str,
    ) -> StorageResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("upload refused".to_string()));
        }
        let data = tokio::fs::read(local_path).await?;
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let object_id = format!("{folder}/{n}_{file_name}");
        self.objects.lock().unwrap().insert(object_id.clone(), data);
        Ok(object_id)
    }

    async fn public_link(&self, object_id: &str, ttl: Duration) -> StorageResult<String> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StorageError::LinkFailed("link refused".to_string()));
        }
        Ok(format!(
            "https://files.test/{object_id}?expires_in={}",
            ttl.as_secs()
        ))
    }

    async fn delete(&self, object_id: &str) -> StorageResult<()> {
        if self.broken_deletes.lock().unwrap().contains(object_id) {
            return Err(StorageError::DeleteFailed(format!("{object_id} is gone")));
        }
        self.objects.lock().unwrap().remove(object_id);
        Ok(())
    }
}
