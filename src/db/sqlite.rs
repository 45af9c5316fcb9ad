use super::{
    DownloadRecord, Stats, Store, StoreResult, UploadedFileRecord, User, UserId, UserProfile,
};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::path::Path;
use tracing::{info, warn};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        user_id         INTEGER PRIMARY KEY,
        display_name    TEXT NOT NULL,
        username        TEXT,
        last_active     INTEGER NOT NULL,
        total_downloads INTEGER NOT NULL DEFAULT 0,
        registered_at   INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS downloads (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id      INTEGER NOT NULL,
        url          TEXT NOT NULL,
        quality      TEXT NOT NULL,
        file_size_mb REAL NOT NULL,
        file_format  TEXT NOT NULL,
        created_at   INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_downloads_created_at ON downloads(created_at);

    CREATE TABLE IF NOT EXISTS uploaded_files (
        object_id   TEXT PRIMARY KEY,
        local_path  TEXT NOT NULL,
        link        TEXT NOT NULL,
        uploaded_at INTEGER NOT NULL,
        expires_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_uploaded_files_expires_at ON uploaded_files(expires_at);
";

fn to_secs(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// SQLite integers are signed; platform ids are stored bit-for-bit.
fn to_db_id(id: UserId) -> i64 {
    id as i64
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get::<_, i64>(0)? as UserId,
        display_name: row.get(1)?,
        username: row.get(2)?,
        last_active: from_secs(row.get(3)?),
        total_downloads: row.get::<_, i64>(4)?.max(0) as u64,
        registered_at: from_secs(row.get(5)?),
    })
}

fn map_upload_row(row: &Row<'_>) -> rusqlite::Result<UploadedFileRecord> {
    Ok(UploadedFileRecord {
        object_id: row.get(0)?,
        local_path: row.get::<_, String>(1)?.into(),
        link: row.get(2)?,
        uploaded_at: from_secs(row.get(3)?),
        expires_at: from_secs(row.get(4)?),
    })
}

/// SQLite-backed [`Store`] behind an r2d2 connection pool.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(10).build(manager)?;

        pool.get()?.execute_batch(SCHEMA)?;
        info!(path = %path.as_ref().display(), "Database ready");

        Ok(Self { pool })
    }

    fn conn(&self) -> StoreResult<DbConnection> {
        Ok(self.pool.get()?)
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<u64> {
        let count: i64 = self.conn()?.query_row(sql, params, |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl Store for SqliteStore {
    fn register_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET display_name = ?2, username = ?3, last_active = ?4
             WHERE user_id = ?1",
            params![
                to_db_id(profile.id),
                profile.display_name,
                profile.username,
                to_secs(now)
            ],
        )?;
        if updated > 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO users (user_id, display_name, username, last_active, total_downloads, registered_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?4)",
            params![
                to_db_id(profile.id),
                profile.display_name,
                profile.username,
                to_secs(now)
            ],
        )?;
        info!(user_id = profile.id, "Registered new user");
        Ok(true)
    }

    fn touch_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO users (user_id, display_name, username, last_active, total_downloads, registered_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?4)
             ON CONFLICT(user_id) DO UPDATE SET last_active = excluded.last_active",
            params![
                to_db_id(profile.id),
                profile.display_name,
                profile.username,
                to_secs(now)
            ],
        )?;
        Ok(())
    }

    fn increment_downloads(&self, user_id: UserId) -> StoreResult<()> {
        let updated = self.conn()?.execute(
            "UPDATE users SET total_downloads = total_downloads + 1 WHERE user_id = ?1",
            params![to_db_id(user_id)],
        )?;
        if updated == 0 {
            warn!(user_id, "Download counter not incremented, user is unknown");
        }
        Ok(())
    }

    fn log_download(&self, record: &DownloadRecord) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO downloads (user_id, url, quality, file_size_mb, file_format, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                to_db_id(record.user_id),
                record.url,
                record.quality,
                record.file_size_mb,
                record.format,
                to_secs(record.created_at)
            ],
        )?;
        Ok(())
    }

    fn insert_upload(&self, record: &UploadedFileRecord) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO uploaded_files (object_id, local_path, link, uploaded_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.object_id,
                record.local_path.to_string_lossy(),
                record.link,
                to_secs(record.uploaded_at),
                to_secs(record.expires_at)
            ],
        )?;
        Ok(())
    }

    fn expired_uploads(&self, now: DateTime<Utc>) -> StoreResult<Vec<UploadedFileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT object_id, local_path, link, uploaded_at, expires_at
             FROM uploaded_files WHERE expires_at < ?1
             ORDER BY expires_at",
        )?;
        let records = stmt
            .query_map(params![to_secs(now)], map_upload_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn uploads_at_path(&self, local_path: &Path) -> StoreResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM uploaded_files WHERE local_path = ?1",
            params![local_path.to_string_lossy()],
        )
    }

    fn delete_upload(&self, object_id: &str) -> StoreResult<()> {
        self.conn()?.execute(
            "DELETE FROM uploaded_files WHERE object_id = ?1",
            params![object_id],
        )?;
        Ok(())
    }

    fn stats(&self, day_start: DateTime<Utc>) -> StoreResult<Stats> {
        let day_start = to_secs(day_start);

        let top_users = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT user_id, display_name, username, last_active, total_downloads, registered_at
                 FROM users ORDER BY total_downloads DESC, user_id ASC LIMIT 5",
            )?;
            let users = stmt
                .query_map([], map_user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            users
        };

        Ok(Stats {
            total_users: self.count("SELECT COUNT(*) FROM users", [])?,
            total_downloads: self.count("SELECT COUNT(*) FROM downloads", [])?,
            downloads_today: self.count(
                "SELECT COUNT(*) FROM downloads WHERE created_at >= ?1",
                params![day_start],
            )?,
            active_users_today: self.count(
                "SELECT COUNT(*) FROM users WHERE last_active >= ?1",
                params![day_start],
            )?,
            top_users,
        })
    }
}

#[cfg(test)]
impl SqliteStore {
    pub fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        use rusqlite::OptionalExtension;

        Ok(self
            .conn()?
            .query_row(
                "SELECT user_id, display_name, username, last_active, total_downloads, registered_at
                 FROM users WHERE user_id = ?1",
                params![to_db_id(user_id)],
                map_user_row,
            )
            .optional()?)
    }

    pub fn downloads_for(&self, user_id: UserId) -> StoreResult<Vec<DownloadRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, url, quality, file_size_mb, file_format, created_at
             FROM downloads WHERE user_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![to_db_id(user_id)], |row| {
                Ok(DownloadRecord {
                    user_id: row.get::<_, i64>(0)? as UserId,
                    url: row.get(1)?,
                    quality: row.get(2)?,
                    file_size_mb: row.get(3)?,
                    format: row.get(4)?,
                    created_at: from_secs(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn all_uploads(&self) -> StoreResult<Vec<UploadedFileRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT object_id, local_path, link, uploaded_at, expires_at
             FROM uploaded_files ORDER BY uploaded_at, object_id",
        )?;
        let records = stmt
            .query_map([], map_upload_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
