//! Frecency-based ranking of tools.
//!
//! Frecency combines frequency (how often) and recency (how recently) a tool
//! was opened, using exponential decay:
//!
//! ```text
//! score = 0.4 × ln(count + 1) × 10 + 0.6 × e^(-λ × age_days) × 100
//! λ = ln(2) / half_life_days
//! ```
//!
//! With a 14-day half-life, a tool used 14 days ago has half the recency
//! weight of one used today.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::ToolboxResult;
use crate::storage::{Storage, ToolUsageStats};

/// Half-life in days for the exponential decay function.
const HALF_LIFE_DAYS: f64 = 14.0;

/// Decay constant: λ = ln(2) / half_life
const LAMBDA: f64 = std::f64::consts::LN_2 / HALF_LIFE_DAYS;

/// Frecency score of a tool at `now`. Higher is more relevant.
pub fn frecency_score(stats: &ToolUsageStats, now: DateTime<Utc>) -> f64 {
    let age_secs = now
        .signed_duration_since(stats.last_used)
        .num_seconds()
        .max(0);
    let age_days = age_secs as f64 / 86_400.0;

    let freq_score = (stats.count as f64 + 1.0).ln();
    let recency_score = (-LAMBDA * age_days).exp();

    0.4 * freq_score * 10.0 + 0.6 * recency_score * 100.0
}

/// Scores keyed by tool id, for ranking catalog search results.
pub fn scores(storage: &dyn Storage, now: DateTime<Utc>) -> ToolboxResult<HashMap<String, f64>> {
    Ok(storage
        .tool_usage()?
        .iter()
        .map(|s| (s.tool_id.clone(), frecency_score(s, now)))
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularTool {
    pub tool_id: String,
    pub category: String,
    pub count: u64,
    pub unique_sessions: usize,
    pub score: f64,
}

/// Most relevant tools first.
pub fn popular(
    storage: &dyn Storage,
    limit: usize,
    now: DateTime<Utc>,
) -> ToolboxResult<Vec<PopularTool>> {
    let mut tools: Vec<PopularTool> = storage
        .tool_usage()?
        .into_iter()
        .map(|s| PopularTool {
            score: frecency_score(&s, now),
            unique_sessions: s.unique_sessions,
            tool_id: s.tool_id,
            category: s.category,
            count: s.count,
        })
        .collect();

    tools.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });
    tools.truncate(limit);
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStorage, ToolUsageEvent};
    use chrono::Duration;

    fn event(tool: &str, at: DateTime<Utc>) -> ToolUsageEvent {
        ToolUsageEvent {
            tool_id: tool.to_string(),
            category: "calculators".to_string(),
            session_id: None,
            at,
        }
    }

    #[test]
    fn test_score_positive_and_bounded() {
        let storage = MemStorage::new();
        let now = Utc::now();
        let stats = storage.record_tool_usage(event("bmi", now)).unwrap();

        let score = frecency_score(&stats, now);
        assert!(score > 0.0);
        assert!(score < 100.0, "score = {}", score);
    }

    #[test]
    fn test_frequent_use_increases_score() {
        let storage = MemStorage::new();
        let now = Utc::now();
        let once = storage.record_tool_usage(event("bmi", now)).unwrap();
        let score1 = frecency_score(&once, now);

        let mut stats = once;
        for _ in 0..10 {
            stats = storage.record_tool_usage(event("bmi", now)).unwrap();
        }
        assert!(frecency_score(&stats, now) > score1);
    }

    #[test]
    fn test_recency_halves_after_half_life() {
        let storage = MemStorage::new();
        let now = Utc::now();
        let stats = storage.record_tool_usage(event("bmi", now)).unwrap();

        let fresh = frecency_score(&stats, now);
        let old = frecency_score(&stats, now + Duration::days(14));
        let freq_part = 0.4 * 2f64.ln() * 10.0;
        assert!(((old - freq_part) * 2.0 - (fresh - freq_part)).abs() < 1e-6);
    }

    #[test]
    fn test_popular_orders_by_score() {
        let storage = MemStorage::new();
        let now = Utc::now();
        storage
            .record_tool_usage(event("old", now - Duration::days(60)))
            .unwrap();
        for _ in 0..3 {
            storage.record_tool_usage(event("hot", now)).unwrap();
        }
        storage.record_tool_usage(event("warm", now)).unwrap();

        let top = popular(&storage, 2, now).unwrap();
        let ids: Vec<_> = top.iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["hot", "warm"]);

        let all = scores(&storage, now).unwrap();
        assert_eq!(all.len(), 3);
    }
}
