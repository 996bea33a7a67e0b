//! PDF, image and audio upload handlers.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::ApiError;
use crate::server::AppState;
use crate::services::files::{self, FileOperation, PdfInfo, ProcessedFile, UploadedFile};
use crate::storage::JobKind;

/// Files under `file_field` plus every text field of the form.
struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        files: Vec::new(),
        fields: HashMap::new(),
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) if name == file_field => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                form.files.push(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some(file_name) => {
                tracing::debug!("Ignoring upload {} in field '{}'", file_name, name);
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

async fn process(state: &AppState, kind: JobKind, multipart: Multipart) -> Result<ProcessedFile, ApiError> {
    let form = read_form(multipart, files::upload_field(kind)).await?;
    let operation = FileOperation::from_fields(kind, &form.fields)?;
    Ok(state.files.process(operation, form.files).await?)
}

fn attachment(done: ProcessedFile, name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, done.output.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
            (header::HeaderName::from_static("x-job-id"), done.job.id.to_string()),
        ],
        done.output.bytes,
    )
        .into_response()
}

/// Merge two or more PDFs.
pub async fn pdf_merge(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let done = process(&state, JobKind::PdfMerge, multipart).await?;
    Ok(attachment(done, "merged.pdf"))
}

#[derive(Serialize)]
pub struct SplitPart {
    pub id: String,
    pub name: String,
    pub pages: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub job_id: String,
    pub files: Vec<SplitPart>,
}

/// Split a PDF. Parts are fetched through the job download endpoint.
pub async fn pdf_split(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SplitResponse>, ApiError> {
    let done = process(&state, JobKind::PdfSplit, multipart).await?;
    let pages = files::pdf_info(&done.output.bytes)
        .map(|info| info.pages)
        .unwrap_or(0);
    let id = done.job.id.to_string();

    Ok(Json(SplitResponse {
        files: vec![SplitPart {
            name: format!("split-{}.pdf", &id[..8]),
            id: id.clone(),
            pages,
        }],
        job_id: id,
    }))
}

/// Page count, size and title of an uploaded PDF.
pub async fn pdf_info(multipart: Multipart) -> Result<Json<PdfInfo>, ApiError> {
    let form = read_form(multipart, "pdf").await?;
    let file = form
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("No pdf file provided".to_string()))?;

    // Same cap as the other PDF tools.
    FileOperation::PdfSplit {
        mode: files::SplitMode::Pages,
        ranges: None,
    }
    .validate(std::slice::from_ref(&file))?;

    Ok(Json(files::pdf_info(&file.bytes)?))
}

pub async fn image_resize(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let done = process(&state, JobKind::ImageResize, multipart).await?;
    let name = format!("resized.{}", extension_of(&done));
    Ok(attachment(done, &name))
}

pub async fn image_compress(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let done = process(&state, JobKind::ImageCompress, multipart).await?;
    let name = format!("compressed.{}", extension_of(&done));
    Ok(attachment(done, &name))
}

pub async fn audio_cut(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let done = process(&state, JobKind::AudioCut, multipart).await?;
    let name = format!("cut.{}", extension_of(&done));
    Ok(attachment(done, &name))
}

fn extension_of(done: &ProcessedFile) -> String {
    done.job
        .result_path
        .as_deref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_string()
}
