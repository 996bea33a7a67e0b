//! Health check.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::ApiError;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub cleanup: &'static str,
    pub active_jobs: usize,
    pub tools: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: i64,
    pub services: ServiceStatus,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let now = Utc::now();
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: now,
        uptime_secs: (now - state.started_at).num_seconds(),
        services: ServiceStatus {
            cleanup: if state.cleanup.is_running() {
                "running"
            } else {
                "stopped"
            },
            active_jobs: state.storage.job_count()?,
            tools: crate::core::TOOLS.len(),
        },
    }))
}
