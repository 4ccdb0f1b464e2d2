// crates/server/src/routes/results.rs
//! Result-file listing and download endpoints.
//!
//! Pure filesystem plumbing over the workflow's output directory, scoped by
//! the task's experiment name. Listing works mid-run, so a client can show
//! files as the workflow produces them.
//!
//! - `GET /api/courses/{task_id}/results/files`            — recursive listing
//! - `GET /api/courses/{task_id}/results/download/{*path}` — download one file

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One generated file in a listing.
#[derive(Debug, Serialize)]
pub struct ResultFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub modified: String,
}

/// Response for the file listing endpoint.
#[derive(Debug, Serialize)]
pub struct ResultFilesResponse {
    pub task_id: String,
    pub exp_name: String,
    pub files: Vec<ResultFile>,
    pub status: courseforge_core::TaskStatus,
    pub total_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/courses/{task_id}/results/files — list generated files.
async fn list_result_files(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<ResultFilesResponse>> {
    let record = state
        .registry
        .snapshot(&task_id)
        .ok_or_else(|| ApiError::TaskNotFound(task_id.clone()))?;

    let exp_dir = state.output_dir.join(&record.exp_name);
    if !exp_dir.exists() {
        return Ok(Json(ResultFilesResponse {
            task_id,
            exp_name: record.exp_name,
            files: Vec::new(),
            status: record.status,
            total_files: 0,
            message: Some("Output directory not found".to_string()),
        }));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&exp_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        // Skip files whose metadata can't be read instead of failing the listing.
        let Ok(meta) = entry.metadata() else { continue };
        let relative = entry
            .path()
            .strip_prefix(&exp_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        let modified = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
            .unwrap_or_default();
        files.push(ResultFile {
            file_type: entry
                .path()
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            name,
            path: relative,
            size: meta.len(),
            modified,
        });
    }

    // Newest first.
    files.sort_by(|a, b| b.modified.cmp(&a.modified));

    Ok(Json(ResultFilesResponse {
        task_id,
        exp_name: record.exp_name,
        total_files: files.len(),
        files,
        status: record.status,
        message: None,
    }))
}

/// GET /api/courses/{task_id}/results/download/{*path} — serve one result
/// file as an attachment.
async fn download_result_file(
    State(state): State<Arc<AppState>>,
    Path((task_id, file_path)): Path<(String, String)>,
) -> ApiResult<Response> {
    let record = state
        .registry
        .snapshot(&task_id)
        .ok_or_else(|| ApiError::TaskNotFound(task_id.clone()))?;

    let relative = sanitize_relative(&file_path)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid file path: {file_path}")))?;
    let full_path = state.output_dir.join(&record.exp_name).join(&relative);

    if !full_path.is_file() {
        return Err(ApiError::FileNotFound(full_path));
    }

    let bytes = tokio::fs::read(&full_path).await?;
    let filename = full_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Accept only plain relative paths: no root, no `..`, no drive prefixes.
fn sanitize_relative(raw: &str) -> Option<PathBuf> {
    let path = FsPath::new(raw);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Build the results router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courses/{task_id}/results/files", get(list_result_files))
        .route(
            "/courses/{task_id}/results/download/{*path}",
            get(download_result_file),
        )
}
