//! Job status and result download.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::ApiError;
use crate::server::AppState;
use crate::services::files::content_type_for;
use crate::storage::FileProcessingJob;

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid job id: {}", id)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileProcessingJob>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.files.job(id)?))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let (job, bytes) = state.files.read_result(id).await?;

    let path = job.result_path.unwrap_or_default();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("result")
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
