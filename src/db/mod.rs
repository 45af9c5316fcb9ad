//! Persistence for users, the download log and uploaded-file records.

mod sqlite;

#[cfg(test)]
pub mod testing;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Chat-platform user id.
pub type UserId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Who sent an event, as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
    pub last_active: DateTime<Utc>,
    pub total_downloads: u64,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRecord {
    pub user_id: UserId,
    pub url: String,
    /// `audio` or the resolution number.
    pub quality: String,
    pub file_size_mb: f64,
    pub format: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFileRecord {
    pub object_id: String,
    pub local_path: PathBuf,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total_users: u64,
    pub total_downloads: u64,
    pub downloads_today: u64,
    pub active_users_today: u64,
    /// At most five users, most downloads first, ties by ascending id.
    pub top_users: Vec<User>,
}

pub trait Store: Send + Sync {
    /// Inserts the user or refreshes its names. Returns `true` for a new user.
    fn register_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Bumps last-active, creating the user on first contact.
    fn touch_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<()>;

    fn increment_downloads(&self, user_id: UserId) -> StoreResult<()>;

    fn log_download(&self, record: &DownloadRecord) -> StoreResult<()>;

    fn insert_upload(&self, record: &UploadedFileRecord) -> StoreResult<()>;

    /// Records with `expires_at` strictly before `now`.
    fn expired_uploads(&self, now: DateTime<Utc>) -> StoreResult<Vec<UploadedFileRecord>>;

    /// How many records still point at `local_path`.
    fn uploads_at_path(&self, local_path: &Path) -> StoreResult<u64>;

    fn delete_upload(&self, object_id: &str) -> StoreResult<()>;

    /// Aggregates, with "today" meaning at or after `day_start`.
    fn stats(&self, day_start: DateTime<Utc>) -> StoreResult<Stats>;
}
