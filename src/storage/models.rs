//! Storage models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// One cached exchange rate, keyed by `(base_currency, target_currency)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRate {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl CurrencyRate {
    pub fn new(base: &str, target: &str, rate: f64, last_updated: DateTime<Utc>) -> Self {
        Self {
            base_currency: base.to_string(),
            target_currency: target.to_string(),
            rate,
            last_updated,
        }
    }

    /// Whether the entry is younger than `ttl` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_updated) < ttl
    }
}

/// Kind of work a file-processing job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    PdfMerge,
    PdfSplit,
    ImageResize,
    ImageCompress,
    AudioCut,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::PdfMerge => "pdf-merge",
            JobKind::PdfSplit => "pdf-split",
            JobKind::ImageResize => "image-resize",
            JobKind::ImageCompress => "image-compress",
            JobKind::AudioCut => "audio-cut",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A tracked file-processing request with a bounded lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessingJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub result_path: Option<PathBuf>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delete_at: DateTime<Utc>,
}

impl FileProcessingJob {
    /// Create a pending job that expires `ttl` after `now`.
    pub fn new(kind: JobKind, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            progress: 0,
            result_path: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            delete_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.delete_at <= now
    }
}

/// A single "tool was opened/used" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsageEvent {
    pub tool_id: String,
    pub category: String,
    pub session_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Aggregated usage of one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsageStats {
    pub tool_id: String,
    pub category: String,
    pub count: u64,
    pub first_used: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Distinct sessions currently tracked for this tool.
    pub unique_sessions: usize,
}

impl ToolUsageStats {
    pub fn from_event(event: &ToolUsageEvent) -> Self {
        Self {
            tool_id: event.tool_id.clone(),
            category: event.category.clone(),
            count: 1,
            first_used: event.at,
            last_used: event.at,
            unique_sessions: 0,
        }
    }

    pub fn record(&mut self, event: &ToolUsageEvent) {
        self.count += 1;
        self.last_used = self.last_used.max(event.at);
        self.first_used = self.first_used.min(event.at);
    }
}

/// Most sessions remembered per tool.
pub(crate) const MAX_TRACKED_SESSIONS: usize = 1000;

/// Sessions not seen for this long are forgotten.
const SESSION_MAX_AGE_DAYS: i64 = 90;

/// Bounded set of session ids with the time each was last seen.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionTracker {
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl SessionTracker {
    /// Mark `session` as seen at `at`, evicting stale or least recent ids
    /// once the cap is exceeded.
    pub fn touch(&mut self, session: &str, at: DateTime<Utc>) {
        match self.last_seen.get_mut(session) {
            Some(seen) => *seen = (*seen).max(at),
            None => {
                self.last_seen.insert(session.to_string(), at);
            }
        }

        if self.last_seen.len() > MAX_TRACKED_SESSIONS {
            let cutoff = at - Duration::days(SESSION_MAX_AGE_DAYS);
            self.last_seen.retain(|_, seen| *seen > cutoff);
        }
        while self.last_seen.len() > MAX_TRACKED_SESSIONS {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.last_seen.remove(&id);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }
}
