//! Periodic cleanup of expired jobs and orphaned files.
//!
//! Each sweep runs two phases in order:
//! 1. Expired jobs: delete the job's result file, then the job record.
//! 2. Orphans: delete plain files older than the configured age from the
//!    watched directories (uploads, temp files, processed results).
//!
//! The sweep is synchronous filesystem work; the scheduler loop runs it on
//! the blocking pool so request handling is never stalled.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ToolboxError, ToolboxResult};
use crate::storage::Storage;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired_jobs_removed: usize,
    pub job_files_deleted: usize,
    pub orphan_files_deleted: usize,
    pub errors: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_jobs_removed == 0
            && self.job_files_deleted == 0
            && self.orphan_files_deleted == 0
            && self.errors.is_empty()
    }
}

/// Message types for communicating with the cleanup loop.
#[derive(Debug)]
enum CleanupMessage {
    /// Sweep immediately and reply with the report.
    RunNow(oneshot::Sender<SweepReport>),
    Shutdown,
}

/// The stateless half of the service: what one sweep touches.
struct Sweeper {
    storage: Arc<dyn Storage>,
    watched_dirs: Vec<PathBuf>,
    orphan_max_age: Duration,
}

impl Sweeper {
    fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        self.remove_expired_jobs(now, &mut report);
        self.remove_orphans(now, &mut report);
        report
    }

    fn remove_expired_jobs(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let expired = match self.storage.expired_jobs(now) {
            Ok(jobs) => jobs,
            Err(e) => {
                report.errors.push(format!("listing expired jobs: {}", e));
                return;
            }
        };

        for job in expired {
            if let Some(path) = &job.result_path {
                match std::fs::remove_file(path) {
                    Ok(()) => report.job_files_deleted += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        // Keep the record so the next sweep retries the file.
                        report
                            .errors
                            .push(format!("removing {}: {}", path.display(), e));
                        continue;
                    }
                }
            }

            match self.storage.delete_job(job.id) {
                Ok(true) => report.expired_jobs_removed += 1,
                Ok(false) => {}
                Err(e) => report.errors.push(format!("deleting job {}: {}", job.id, e)),
            }
        }
    }

    fn remove_orphans(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let cutoff = SystemTime::from(now)
            .checked_sub(self.orphan_max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for dir in &self.watched_dirs {
            if !dir.is_dir() {
                continue;
            }

            for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        report.errors.push(format!("scanning {}: {}", dir.display(), e));
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let modified = match entry
                    .metadata()
                    .map_err(|e| e.to_string())
                    .and_then(|m| m.modified().map_err(|e| e.to_string()))
                {
                    Ok(modified) => modified,
                    Err(e) => {
                        report
                            .errors
                            .push(format!("reading {}: {}", entry.path().display(), e));
                        continue;
                    }
                };
                if modified >= cutoff {
                    continue;
                }

                match std::fs::remove_file(entry.path()) {
                    Ok(()) => report.orphan_files_deleted += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => report
                        .errors
                        .push(format!("removing {}: {}", entry.path().display(), e)),
                }
            }
        }
    }
}

/// Scheduled cleanup service.
///
/// Created stopped; [`CleanupService::start`] spawns the loop and
/// [`CleanupService::stop`] ends it and waits for an in-flight sweep.
pub struct CleanupService {
    sweeper: Arc<Sweeper>,
    interval: Duration,
    enabled: bool,
    tx: Mutex<Option<mpsc::Sender<CleanupMessage>>>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl CleanupService {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self {
            sweeper: Arc::new(Sweeper {
                storage,
                watched_dirs: config.watched_dirs(),
                orphan_max_age: config.cleanup.orphan_max_age(),
            }),
            interval: config.cleanup.interval(),
            enabled: config.cleanup.enabled,
            tx: Mutex::new(None),
            task_handle: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run both phases once, synchronously.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        self.sweeper.sweep(now)
    }

    /// Spawn the scheduler loop. Does nothing if disabled or already running.
    pub async fn start(&self) {
        if !self.enabled {
            tracing::info!("Cleanup scheduler disabled by config");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Cleanup scheduler already running");
            return;
        }

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(cleanup_loop(
            rx,
            Arc::clone(&self.sweeper),
            Arc::clone(&self.running),
            self.interval,
        ));

        *self.tx.lock().await = Some(tx);
        *self.task_handle.lock().await = Some(handle);
        tracing::info!(
            "Cleanup scheduler started (every {}s)",
            self.interval.as_secs()
        );
    }

    /// Trigger a sweep on the running loop and wait for its report.
    pub async fn run_now(&self) -> ToolboxResult<SweepReport> {
        let tx = self
            .tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| ToolboxError::Processing("cleanup scheduler is not running".into()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(CleanupMessage::RunNow(reply_tx))
            .await
            .map_err(|_| ToolboxError::Processing("cleanup scheduler has stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| ToolboxError::Processing("cleanup sweep was dropped".into()))
    }

    /// Stop the loop and wait for it to finish.
    pub async fn stop(&self) -> ToolboxResult<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(tx) = self.tx.lock().await.take() {
            let _ = tx.send(CleanupMessage::Shutdown).await;
        }

        if let Some(handle) = self.task_handle.lock().await.take() {
            handle.await.map_err(|e| {
                ToolboxError::Processing(format!("Cleanup task panicked: {}", e))
            })?;
            tracing::info!("Cleanup scheduler stopped");
        }

        Ok(())
    }
}

async fn cleanup_loop(
    mut rx: mpsc::Receiver<CleanupMessage>,
    sweeper: Arc<Sweeper>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let reply = match tokio::time::timeout(interval, rx.recv()).await {
            Ok(Some(CleanupMessage::RunNow(reply))) => Some(reply),
            Ok(Some(CleanupMessage::Shutdown)) | Ok(None) => break,
            // Timeout - scheduled sweep
            Err(_) => None,
        };

        let task_sweeper = Arc::clone(&sweeper);
        let report = match tokio::task::spawn_blocking(move || task_sweeper.sweep(Utc::now())).await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Cleanup sweep panicked: {}", e);
                continue;
            }
        };

        if report.is_empty() {
            tracing::debug!("Cleanup sweep found nothing to remove");
        } else {
            tracing::info!(
                "Cleanup removed {} expired jobs ({} files) and {} orphan files",
                report.expired_jobs_removed,
                report.job_files_deleted,
                report.orphan_files_deleted
            );
        }
        for error in &report.errors {
            tracing::warn!("Cleanup: {}", error);
        }

        if let Some(reply) = reply {
            let _ = reply.send(report);
        }
    }
}
