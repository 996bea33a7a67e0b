//! Catalog, usage and formula handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::ApiError;
use crate::core::{catalog, QuickAnswer, ToolCategory, ToolDescriptor, ToolKind};
use crate::server::AppState;
use crate::services::formulas;
use crate::services::usage::{self, PopularTool};
use crate::storage::ToolUsageEvent;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub tools: Vec<&'static ToolDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_answer: Option<QuickAnswer>,
}

/// Search the catalog.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let category = match params.category.as_deref().filter(|c| !c.is_empty() && *c != "all") {
        Some(c) => Some(
            ToolCategory::parse(c)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown category: {}", c)))?,
        ),
        None => None,
    };
    let query = params.q.unwrap_or_default();

    // Ranking degrades to plain fuzzy order if usage can't be read.
    let scores = usage::scores(state.storage.as_ref(), Utc::now()).unwrap_or_else(|e| {
        tracing::warn!("Failed to read usage scores: {}", e);
        HashMap::new()
    });

    Ok(Json(SearchResponse {
        tools: state.catalog.search(&query, category, &scores),
        quick_answer: state.catalog.quick_answer(&query),
    }))
}

#[derive(Deserialize)]
pub struct PopularParams {
    pub limit: Option<usize>,
}

pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularParams>,
) -> Result<Json<Vec<PopularTool>>, ApiError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    Ok(Json(usage::popular(
        state.storage.as_ref(),
        limit,
        Utc::now(),
    )?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub tool_id: String,
    pub category: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub success: bool,
}

/// Record that a tool was opened.
pub async fn record_usage(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UsageRequest>,
) -> Result<Json<UsageResponse>, ApiError> {
    let tool = catalog::find(&req.tool_id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown tool: {}", req.tool_id)))?;

    let stats = state.storage.record_tool_usage(ToolUsageEvent {
        tool_id: tool.id.to_string(),
        category: req
            .category
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| tool.category.as_str().to_string()),
        session_id: req.session_id.filter(|s| !s.is_empty()),
        at: Utc::now(),
    })?;
    tracing::debug!("Tool {} used ({} total)", stats.tool_id, stats.count);

    Ok(Json(UsageResponse { success: true }))
}

/// Run a formula tool on a JSON input.
pub async fn run(
    Path(id): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let tool =
        catalog::find(&id).ok_or_else(|| ApiError::NotFound(format!("Unknown tool: {}", id)))?;
    if tool.kind != ToolKind::Formula {
        return Err(ApiError::BadRequest(format!(
            "{} does not take a JSON input",
            tool.id
        )));
    }

    Ok(Json(formulas::run(tool.id, input)?))
}
