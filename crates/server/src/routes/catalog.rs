// crates/server/src/routes/catalog.rs
//! Catalog storage endpoints.
//!
//! Catalogs are JSON documents describing course content; a stored catalog
//! can be referenced by name in a later generation request.
//!
//! - `POST /api/catalog/upload` — store a catalog document
//! - `GET  /api/catalog/list`   — list stored catalogs

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Client-side filename, kept as a suffix of the stored name.
    #[serde(default = "default_upload_name")]
    pub name: String,
}

fn default_upload_name() -> String {
    "catalog.json".to_string()
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub message: String,
}

/// One stored catalog in a listing.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub filename: String,
    pub size: u64,
    pub modified: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogListResponse {
    pub catalogs: Vec<CatalogEntry>,
}

/// POST /api/catalog/upload?name=... — store a catalog JSON document.
///
/// The body must be valid JSON (the extractor rejects anything else with a
/// client error). Requires a resolvable API key, for parity with the
/// submission endpoint. Stored under a unique `uploaded_` prefix so
/// repeated uploads never collide.
async fn upload_catalog(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    Json(catalog): Json<serde_json::Value>,
) -> ApiResult<Json<UploadResponse>> {
    state.resolve_api_key(&headers)?;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let filename = format!("uploaded_{}_{}", &suffix[..8], sanitize_name(&params.name));
    let path = state.catalog_dir.join(&filename);

    tokio::fs::create_dir_all(&state.catalog_dir).await?;
    let payload = serde_json::to_string_pretty(&catalog)
        .map_err(|e| ApiError::BadRequest(format!("invalid catalog JSON: {e}")))?;
    tokio::fs::write(&path, payload).await?;

    tracing::info!(filename = %filename, "catalog uploaded");
    Ok(Json(UploadResponse {
        success: true,
        filename,
        message: "Catalog uploaded successfully".to_string(),
    }))
}

/// GET /api/catalog/list — list stored catalog files.
async fn list_catalogs(State(state): State<Arc<AppState>>) -> ApiResult<Json<CatalogListResponse>> {
    let mut catalogs = Vec::new();

    let mut entries = match tokio::fs::read_dir(&state.catalog_dir).await {
        Ok(entries) => entries,
        // No uploads yet is not an error.
        Err(_) => return Ok(Json(CatalogListResponse { catalogs })),
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        catalogs.push(CatalogEntry {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            filename: entry.file_name().to_string_lossy().to_string(),
            size: meta.len(),
            modified: meta
                .modified()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_default(),
        });
    }

    Ok(Json(CatalogListResponse { catalogs }))
}

/// Keep only filename-safe characters; a hostile name must not escape the
/// catalog directory.
fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        default_upload_name()
    } else {
        cleaned
    }
}

/// Build the catalog router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalog/upload", post(upload_catalog))
        .route("/catalog/list", get(list_catalogs))
}
