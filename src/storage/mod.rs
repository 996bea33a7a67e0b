//! Process-local state for rates, jobs and tool usage.
//!
//! Everything goes through the [`Storage`] trait so a durable key-value
//! backend can replace [`MemStorage`] without touching the services. The
//! in-memory store loses all state on restart; cached rates and job records
//! are both advisory and can be rebuilt.

mod models;

pub use models::{
    CurrencyRate, FileProcessingJob, JobKind, JobStatus, ToolUsageEvent, ToolUsageStats,
};

use models::SessionTracker;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::{ToolboxError, ToolboxResult};

/// Backing store shared by the currency cache, job tracker and usage tracker.
pub trait Storage: Send + Sync {
    /// Insert or overwrite the rate for `(base, target)`.
    fn upsert_rate(&self, rate: CurrencyRate) -> ToolboxResult<()>;
    fn get_rate(&self, base: &str, target: &str) -> ToolboxResult<Option<CurrencyRate>>;
    /// All cached rates with the given base, regardless of age.
    fn rates_for_base(&self, base: &str) -> ToolboxResult<Vec<CurrencyRate>>;

    fn insert_job(&self, job: FileProcessingJob) -> ToolboxResult<()>;
    fn get_job(&self, id: Uuid) -> ToolboxResult<Option<FileProcessingJob>>;
    fn update_job_progress(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> ToolboxResult<FileProcessingJob>;
    fn complete_job(
        &self,
        id: Uuid,
        result_path: PathBuf,
        at: DateTime<Utc>,
    ) -> ToolboxResult<FileProcessingJob>;
    fn fail_job(&self, id: Uuid, message: String, at: DateTime<Utc>)
        -> ToolboxResult<FileProcessingJob>;
    /// Jobs whose `delete_at` is at or before `now`.
    fn expired_jobs(&self, now: DateTime<Utc>) -> ToolboxResult<Vec<FileProcessingJob>>;
    /// Returns whether a record was removed.
    fn delete_job(&self, id: Uuid) -> ToolboxResult<bool>;
    fn job_count(&self) -> ToolboxResult<usize>;

    fn record_tool_usage(&self, event: ToolUsageEvent) -> ToolboxResult<ToolUsageStats>;
    fn tool_usage(&self) -> ToolboxResult<Vec<ToolUsageStats>>;
}

/// In-memory [`Storage`] backed by lock-guarded hash maps.
#[derive(Debug, Default)]
pub struct MemStorage {
    rates: RwLock<HashMap<(String, String), CurrencyRate>>,
    jobs: RwLock<HashMap<Uuid, FileProcessingJob>>,
    usage: RwLock<HashMap<String, UsageEntry>>,
}

/// Stats handed out to callers, plus the session ids behind `unique_sessions`.
#[derive(Debug)]
struct UsageEntry {
    stats: ToolUsageStats,
    sessions: SessionTracker,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, what: &str) -> ToolboxResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| ToolboxError::Storage(format!("{} lock poisoned", what)))
}

fn write<'a, T>(lock: &'a RwLock<T>, what: &str) -> ToolboxResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| ToolboxError::Storage(format!("{} lock poisoned", what)))
}

impl MemStorage {
    fn modify_job<F>(&self, id: Uuid, f: F) -> ToolboxResult<FileProcessingJob>
    where
        F: FnOnce(&mut FileProcessingJob),
    {
        let mut jobs = write(&self.jobs, "jobs")?;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| ToolboxError::NotFound(format!("job {}", id)))?;
        f(job);
        Ok(job.clone())
    }
}

impl Storage for MemStorage {
    fn upsert_rate(&self, rate: CurrencyRate) -> ToolboxResult<()> {
        let key = (rate.base_currency.clone(), rate.target_currency.clone());
        write(&self.rates, "rates")?.insert(key, rate);
        Ok(())
    }

    fn get_rate(&self, base: &str, target: &str) -> ToolboxResult<Option<CurrencyRate>> {
        let rates = read(&self.rates, "rates")?;
        Ok(rates.get(&(base.to_string(), target.to_string())).cloned())
    }

    fn rates_for_base(&self, base: &str) -> ToolboxResult<Vec<CurrencyRate>> {
        let rates = read(&self.rates, "rates")?;
        Ok(rates
            .values()
            .filter(|r| r.base_currency == base)
            .cloned()
            .collect())
    }

    fn insert_job(&self, job: FileProcessingJob) -> ToolboxResult<()> {
        write(&self.jobs, "jobs")?.insert(job.id, job);
        Ok(())
    }

    fn get_job(&self, id: Uuid) -> ToolboxResult<Option<FileProcessingJob>> {
        Ok(read(&self.jobs, "jobs")?.get(&id).cloned())
    }

    fn update_job_progress(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
    ) -> ToolboxResult<FileProcessingJob> {
        self.modify_job(id, |job| {
            job.status = status;
            job.progress = progress.min(100);
        })
    }

    fn complete_job(
        &self,
        id: Uuid,
        result_path: PathBuf,
        at: DateTime<Utc>,
    ) -> ToolboxResult<FileProcessingJob> {
        self.modify_job(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.result_path = Some(result_path);
            job.completed_at = Some(at);
        })
    }

    fn fail_job(
        &self,
        id: Uuid,
        message: String,
        at: DateTime<Utc>,
    ) -> ToolboxResult<FileProcessingJob> {
        self.modify_job(id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.completed_at = Some(at);
        })
    }

    fn expired_jobs(&self, now: DateTime<Utc>) -> ToolboxResult<Vec<FileProcessingJob>> {
        let jobs = read(&self.jobs, "jobs")?;
        Ok(jobs.values().filter(|j| j.is_expired(now)).cloned().collect())
    }

    fn delete_job(&self, id: Uuid) -> ToolboxResult<bool> {
        Ok(write(&self.jobs, "jobs")?.remove(&id).is_some())
    }

    fn job_count(&self) -> ToolboxResult<usize> {
        Ok(read(&self.jobs, "jobs")?.len())
    }

    fn record_tool_usage(&self, event: ToolUsageEvent) -> ToolboxResult<ToolUsageStats> {
        let mut usage = write(&self.usage, "usage")?;
        let entry = usage
            .entry(event.tool_id.clone())
            .and_modify(|e| e.stats.record(&event))
            .or_insert_with(|| UsageEntry {
                stats: ToolUsageStats::from_event(&event),
                sessions: SessionTracker::default(),
            });
        if let Some(session) = &event.session_id {
            entry.sessions.touch(session, event.at);
            entry.stats.unique_sessions = entry.sessions.len();
        }
        Ok(entry.stats.clone())
    }

    fn tool_usage(&self) -> ToolboxResult<Vec<ToolUsageStats>> {
        Ok(read(&self.usage, "usage")?
            .values()
            .map(|e| e.stats.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_upsert_overwrites_rate() {
        let storage = MemStorage::new();
        let now = Utc::now();
        storage
            .upsert_rate(CurrencyRate::new("USD", "EUR", 0.9, now))
            .unwrap();
        storage
            .upsert_rate(CurrencyRate::new("USD", "EUR", 0.92, now))
            .unwrap();
        storage
            .upsert_rate(CurrencyRate::new("EUR", "USD", 1.08, now))
            .unwrap();

        let rate = storage.get_rate("USD", "EUR").unwrap().unwrap();
        assert_eq!(rate.rate, 0.92);
        assert_eq!(storage.rates_for_base("USD").unwrap().len(), 1);
        assert!(storage.get_rate("USD", "GBP").unwrap().is_none());
    }

    #[test]
    fn test_rate_freshness() {
        let now = Utc::now();
        let rate = CurrencyRate::new("USD", "EUR", 0.9, now - Duration::minutes(30));
        assert!(rate.is_fresh(now, Duration::hours(1)));
        assert!(!rate.is_fresh(now + Duration::minutes(31), Duration::hours(1)));
    }

    #[test]
    fn test_job_lifecycle() {
        let storage = MemStorage::new();
        let now = Utc::now();
        let job = FileProcessingJob::new(JobKind::PdfMerge, now, Duration::hours(1));
        let id = job.id;
        assert_eq!(job.delete_at, now + Duration::hours(1));
        storage.insert_job(job).unwrap();

        let job = storage
            .update_job_progress(id, JobStatus::Processing, 150)
            .unwrap();
        assert_eq!(job.progress, 100);
        assert_eq!(job.status, JobStatus::Processing);

        let job = storage
            .complete_job(id, PathBuf::from("processed/out.pdf"), now)
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(now));

        assert!(storage.delete_job(id).unwrap());
        assert!(!storage.delete_job(id).unwrap());
        assert_eq!(storage.job_count().unwrap(), 0);
    }

    #[test]
    fn test_missing_job_is_not_found() {
        let storage = MemStorage::new();
        let err = storage
            .fail_job(Uuid::new_v4(), "boom".into(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ToolboxError::NotFound(_)));
    }

    #[test]
    fn test_expired_jobs_boundary() {
        let storage = MemStorage::new();
        let now = Utc::now();
        let mut due = FileProcessingJob::new(JobKind::AudioCut, now, Duration::hours(1));
        due.delete_at = now;
        let later = FileProcessingJob::new(JobKind::AudioCut, now, Duration::hours(1));
        let due_id = due.id;
        storage.insert_job(due).unwrap();
        storage.insert_job(later).unwrap();

        let expired = storage.expired_jobs(now).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, due_id);
    }

    #[test]
    fn test_usage_aggregates_sessions() {
        let storage = MemStorage::new();
        let now = Utc::now();
        for session in ["a", "b", "a"] {
            storage
                .record_tool_usage(ToolUsageEvent {
                    tool_id: "bmi".into(),
                    category: "health".into(),
                    session_id: Some(session.into()),
                    at: now,
                })
                .unwrap();
        }
        let stats = storage
            .record_tool_usage(ToolUsageEvent {
                tool_id: "bmi".into(),
                category: "health".into(),
                session_id: None,
                at: now + Duration::seconds(5),
            })
            .unwrap();

        assert_eq!(stats.count, 4);
        assert_eq!(stats.unique_sessions, 2);
        assert_eq!(stats.last_used, now + Duration::seconds(5));
        assert_eq!(storage.tool_usage().unwrap().len(), 1);
    }

    #[test]
    fn test_session_tracking_is_capped() {
        let storage = MemStorage::new();
        let start = Utc::now();
        let total = models::MAX_TRACKED_SESSIONS + 500;

        let mut stats = None;
        for i in 0..total {
            stats = Some(
                storage
                    .record_tool_usage(ToolUsageEvent {
                        tool_id: "bmi".into(),
                        category: "health".into(),
                        session_id: Some(format!("session-{}", i)),
                        at: start + Duration::seconds(i as i64),
                    })
                    .unwrap(),
            );
        }
        let stats = stats.unwrap();
        assert_eq!(stats.count, total as u64);
        assert_eq!(stats.unique_sessions, models::MAX_TRACKED_SESSIONS);

        // The least recent ids went first, so a newer session is still known
        // and repeating it doesn't grow the set.
        let again = storage
            .record_tool_usage(ToolUsageEvent {
                tool_id: "bmi".into(),
                category: "health".into(),
                session_id: Some(format!("session-{}", total - 1)),
                at: start + Duration::seconds(total as i64),
            })
            .unwrap();
        assert_eq!(again.unique_sessions, models::MAX_TRACKED_SESSIONS);
    }

    #[test]
    fn test_stale_sessions_are_dropped_first() {
        let mut tracker = SessionTracker::default();
        let now = Utc::now();
        for i in 0..models::MAX_TRACKED_SESSIONS {
            tracker.touch(&format!("old-{}", i), now - Duration::days(200));
        }
        tracker.touch("fresh", now);

        // Every 200-day-old id is past the age limit.
        assert_eq!(tracker.len(), 1);
    }
}
