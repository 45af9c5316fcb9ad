//! Test stores: a throwaway SQLite file and a wrapper with switchable failures.

use super::{
    DownloadRecord, SqliteStore, Stats, Store, StoreError, StoreResult, UploadedFileRecord,
    UserId, UserProfile,
};
use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// A store in a throwaway directory; keep the `TempDir` alive with it.
pub fn temp_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("test.sqlite")).unwrap();
    (dir, store)
}

/// [`SqliteStore`] whose writes can be made to fail one kind at a time.
pub struct FailingStore {
    inner: SqliteStore,
    insert_upload: AtomicBool,
    delete_upload: AtomicBool,
    log_download: AtomicBool,
    increment_downloads: AtomicBool,
}

fn refused() -> StoreError {
    StoreError::Sqlite(rusqlite::Error::InvalidQuery)
}

fn check(flag: &AtomicBool) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(refused())
    } else {
        Ok(())
    }
}

impl FailingStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            insert_upload: AtomicBool::new(false),
            delete_upload: AtomicBool::new(false),
            log_download: AtomicBool::new(false),
            increment_downloads: AtomicBool::new(false),
        }
    }

    pub fn fail_insert_upload(&self, fail: bool) {
        self.insert_upload.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_upload(&self, fail: bool) {
        self.delete_upload.store(fail, Ordering::SeqCst);
    }

    pub fn fail_log_download(&self, fail: bool) {
        self.log_download.store(fail, Ordering::SeqCst);
    }

    pub fn fail_increment_downloads(&self, fail: bool) {
        self.increment_downloads.store(fail, Ordering::SeqCst);
    }
}

impl Deref for FailingStore {
    type Target = SqliteStore;

    fn deref(&self) -> &SqliteStore {
        &self.inner
    }
}

impl Store for FailingStore {
    fn register_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.register_user(profile, now)
    }

    fn touch_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<()> {
        self.inner.touch_user(profile, now)
    }

    fn increment_downloads(&self, user_id: UserId) -> StoreResult<()> {
        check(&self.increment_downloads)?;
        self.inner.increment_downloads(user_id)
    }

    fn log_download(&self, record: &DownloadRecord) -> StoreResult<()> {
        check(&self.log_download)?;
        self.inner.log_download(record)
    }

    fn insert_upload(&self, record: &UploadedFileRecord) -> StoreResult<()> {
        check(&self.insert_upload)?;
        self.inner.insert_upload(record)
    }

    fn expired_uploads(&self, now: DateTime<Utc>) -> StoreResult<Vec<UploadedFileRecord>> {
        self.inner.expired_uploads(now)
    }

    fn uploads_at_path(&self, local_path: &Path) -> StoreResult<u64> {
        self.inner.uploads_at_path(local_path)
    }

    fn delete_upload(&self, object_id: &str) -> StoreResult<()> {
        check(&self.delete_upload)?;
        self.inner.delete_upload(object_id)
    }

    fn stats(&self, day_start: DateTime<Utc>) -> StoreResult<Stats> {
        self.inner.stats(day_start)
    }
}

/// Temp store wrapped in a [`FailingStore`], every write succeeding until told otherwise.
pub fn failing_store() -> (TempDir, FailingStore) {
    let (dir, store) = temp_store();
    (dir, FailingStore::new(store))
}
