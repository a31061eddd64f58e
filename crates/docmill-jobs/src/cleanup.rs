//! Cleanup scheduler: periodic reclamation of expired jobs and artifacts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use docmill_core::defaults;
use docmill_core::{Error, JobRepository, Result};
use docmill_db::Database;

use crate::materializer::ResultMaterializer;

/// Configuration for the cleanup scheduler.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Interval between sweeps.
    pub interval: Duration,
    /// Shortened retry interval after a failed pass.
    pub error_backoff: Duration,
    /// Retention window for completed jobs.
    pub retention: chrono::Duration,
    /// Reclaim window for jobs stuck in PENDING (abandoned).
    pub pending_retention: chrono::Duration,
    /// Maximum age of raw staged uploads before the uploads sweep removes
    /// them.
    pub upload_retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::CLEANUP_INTERVAL_SECS),
            error_backoff: Duration::from_secs(defaults::CLEANUP_ERROR_BACKOFF_SECS),
            retention: chrono::Duration::hours(defaults::JOB_RETENTION_HOURS),
            pending_retention: chrono::Duration::hours(defaults::JOB_PENDING_RETENTION_HOURS),
            upload_retention: Duration::from_secs(defaults::UPLOAD_RETENTION_SECS),
        }
    }
}

impl CleanupConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLEANUP_INTERVAL_SECS` | `3600` | Seconds between sweeps |
    /// | `CLEANUP_ERROR_BACKOFF_SECS` | `300` | Retry delay after a failed pass |
    /// | `JOB_RETENTION_HOURS` | `24` | Completed-job retention window |
    /// | `JOB_PENDING_RETENTION_HOURS` | `24` | Abandoned-PENDING reclaim window |
    /// | `UPLOAD_RETENTION_SECS` | `3600` | Staged-upload retention |
    pub fn from_env() -> Self {
        fn env_u64(name: &str, default: u64) -> u64 {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        }
        fn env_hours(name: &str, default: i64) -> chrono::Duration {
            let hours = std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(default)
                .max(0);
            chrono::Duration::hours(hours)
        }

        Self {
            interval: Duration::from_secs(env_u64(
                "CLEANUP_INTERVAL_SECS",
                defaults::CLEANUP_INTERVAL_SECS,
            )),
            error_backoff: Duration::from_secs(env_u64(
                "CLEANUP_ERROR_BACKOFF_SECS",
                defaults::CLEANUP_ERROR_BACKOFF_SECS,
            )),
            retention: env_hours("JOB_RETENTION_HOURS", defaults::JOB_RETENTION_HOURS),
            pending_retention: env_hours(
                "JOB_PENDING_RETENTION_HOURS",
                defaults::JOB_PENDING_RETENTION_HOURS,
            ),
            upload_retention: Duration::from_secs(env_u64(
                "UPLOAD_RETENTION_SECS",
                defaults::UPLOAD_RETENTION_SECS,
            )),
        }
    }

    /// Set the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the completed-job retention window.
    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the abandoned-PENDING reclaim window.
    pub fn with_pending_retention(mut self, retention: chrono::Duration) -> Self {
        self.pending_retention = retention;
        self
    }

    /// Set the staged-upload retention.
    pub fn with_upload_retention(mut self, retention: Duration) -> Self {
        self.upload_retention = retention;
        self
    }
}

/// Handle for stopping a running cleanup scheduler.
pub struct CleanupHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CleanupHandle {
    /// Signal the scheduler to stop. No timers are left behind.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("cleanup scheduler is not running".into()))
    }
}

/// Periodic background sweeper.
///
/// Owned by the process lifecycle: started once at startup, stopped at
/// shutdown via [`CleanupHandle`].
pub struct CleanupScheduler {
    db: Database,
    materializer: Arc<ResultMaterializer>,
    uploads_dir: PathBuf,
    config: CleanupConfig,
}

impl CleanupScheduler {
    /// Create a new scheduler.
    pub fn new(
        db: Database,
        materializer: Arc<ResultMaterializer>,
        uploads_dir: impl Into<PathBuf>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            db,
            materializer,
            uploads_dir: uploads_dir.into(),
            config,
        }
    }

    /// Start the recurring sweep and return a shutdown handle.
    pub fn start(self) -> CleanupHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        CleanupHandle { shutdown_tx }
    }

    /// Scheduler loop: sweep, then sleep; a failed pass reschedules at the
    /// shortened backoff interval instead of terminating the task.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_hours = self.config.retention.num_hours(),
            "Cleanup scheduler started"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Cleanup scheduler received shutdown signal");
                    break;
                }
                _ = sleep(delay) => {}
            }

            delay = match self.sweep().await {
                Ok(_) => self.config.interval,
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "Cleanup pass failed, retrying at shortened interval"
                    );
                    self.config.error_backoff
                }
            };
        }

        info!("Cleanup scheduler stopped");
    }

    /// One full cleanup pass. Returns the number of reclaimed job records.
    pub async fn sweep(&self) -> Result<usize> {
        let now = Utc::now();
        let deleted = self
            .db
            .jobs
            .delete_expired(now - self.config.retention, now - self.config.pending_retention)
            .await?;

        // One failing directory removal must not abort the rest.
        for job_id in &deleted {
            if let Err(e) = self.materializer.remove(*job_id).await {
                warn!(%job_id, error = %e, "Failed to remove output directory");
            }
        }

        if !deleted.is_empty() {
            info!(reclaimed = deleted.len(), "Cleaned up expired jobs");
        }

        self.sweep_uploads().await;
        Ok(deleted.len())
    }

    /// Remove staged uploads older than the upload retention window.
    ///
    /// Bounds disk usage from files abandoned before a job was created.
    /// Strictly best-effort: every failure is logged and skipped.
    async fn sweep_uploads(&self) {
        let mut entries = match tokio::fs::read_dir(&self.uploads_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(
                    dir = %self.uploads_dir.display(),
                    error = %e,
                    "Failed to read uploads directory"
                );
                return;
            }
        };

        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let expired = entry
                .metadata()
                .await
                .ok()
                .filter(|meta| meta.is_file())
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| modified.elapsed().ok())
                .map(|age| age > self.config.upload_retention)
                .unwrap_or(false);
            if !expired {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to remove stale upload")
                }
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned up stale uploads");
        }
    }
}
