//! Background cleanup: expired uploads and stale scratch files.
//!
//! Both jobs can be driven one cycle at a time ([`Janitor::sweep_expired`],
//! [`Janitor::sweep_scratch`]) or scheduled with [`Janitor::spawn`].

use crate::clock::Clock;
use crate::db::Store;
use crate::storage::ObjectStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct JanitorSettings {
    pub expired_interval: Duration,
    pub scratch_interval: Duration,
    /// Scratch entries modified more recently than this are left alone.
    pub scratch_min_age: Duration,
    pub scratch_dirs: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Records deleted from the store.
    pub removed: usize,
    /// Remote objects whose deletion failed; their records are still removed.
    pub remote_failures: usize,
    /// Records that could not be deleted from the store and will be retried next cycle.
    pub record_failures: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScratchReport {
    pub removed: usize,
    pub skipped_recent: usize,
}

pub struct Janitor {
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: JanitorSettings,
}

impl Janitor {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: JanitorSettings,
    ) -> Self {
        Self {
            storage,
            store,
            clock,
            settings,
        }
    }

    /// One pass over uploads whose expiration has passed.
    pub async fn sweep_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let expired = match self.store.expired_uploads(self.clock.now()) {
            Ok(expired) => expired,
            Err(e) => {
                error!(error = %e, "Failed to list expired uploads");
                return report;
            }
        };

        for record in expired {
            if let Err(e) = self.storage.delete(&record.object_id).await {
                warn!(object_id = %record.object_id, error = %e, "Remote delete failed");
                report.remote_failures += 1;
            }

            if let Err(e) = self.store.delete_upload(&record.object_id) {
                error!(
                    object_id = %record.object_id,
                    error = %e,
                    "Failed to delete upload record"
                );
                report.record_failures += 1;
                continue;
            }
            report.removed += 1;

            self.remove_local(&record.local_path).await;
        }

        if report.removed > 0 || report.record_failures > 0 {
            info!(
                removed = report.removed,
                remote_failures = report.remote_failures,
                record_failures = report.record_failures,
                "Expired upload sweep finished"
            );
        }
        report
    }

    /// Deletes a swept upload's local file unless another record still points at it,
    /// then its per-fetch directory once empty.
    async fn remove_local(&self, path: &Path) {
        match self.store.uploads_at_path(path) {
            Ok(0) => {}
            Ok(remaining) => {
                debug!(path = %path.display(), remaining, "Local file still referenced");
                return;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot check local file references");
                return;
            }
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed local file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove local file"
            ),
        }

        let Some(fetch_dir) = path.parent() else {
            return;
        };
        let in_scratch_root = fetch_dir
            .parent()
            .is_some_and(|root| self.settings.scratch_dirs.iter().any(|dir| dir == root));
        if in_scratch_root && tokio::fs::remove_dir(fetch_dir).await.is_ok() {
            debug!(dir = %fetch_dir.display(), "Removed fetch directory");
        }
    }

    /// Empties the scratch directories, sparing entries younger than `scratch_min_age`.
    pub async fn sweep_scratch(&self) -> ScratchReport {
        let mut report = ScratchReport::default();
        let now = SystemTime::now();

        for dir in &self.settings.scratch_dirs {
            if let Err(e) = self.sweep_dir(dir, now, &mut report).await {
                warn!(dir = %dir.display(), error = %e, "Scratch sweep failed");
            }
        }

        if report.removed > 0 {
            info!(
                removed = report.removed,
                skipped_recent = report.skipped_recent,
                "Scratch sweep finished"
            );
        }
        report
    }

    async fn sweep_dir(
        &self,
        dir: &Path,
        now: SystemTime,
        report: &mut ScratchReport,
    ) -> std::io::Result<()> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat scratch entry");
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.settings.scratch_min_age {
                report.skipped_recent += 1;
                continue;
            }

            let removed = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match removed {
                Ok(()) => report.removed += 1,
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch entry"
                ),
            }
        }

        Ok(())
    }

    /// Runs both sweeps on their own timers until `shutdown` fires.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let expired = {
            let janitor = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(janitor.settings.expired_interval);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            janitor.sweep_expired().await;
                        }
                    }
                }
                debug!("Expired upload sweep stopped");
            })
        };

        let scratch = {
            let janitor = self;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(janitor.settings.scratch_interval);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            janitor.sweep_scratch().await;
                        }
                    }
                }
                debug!("Scratch sweep stopped");
            })
        };

        vec![expired, scratch]
    }
}
