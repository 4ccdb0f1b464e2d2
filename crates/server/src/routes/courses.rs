// crates/server/src/routes/courses.rs
//! Course generation submission and status endpoints.
//!
//! - `POST /api/courses/generate`          — Submit a generation job
//! - `GET  /api/courses/{task_id}/status`  — Poll one task's record

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use courseforge_core::{run_generation, CourseRequest, TaskRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

/// POST /api/courses/generate — Submit a course generation job.
///
/// Returns the task id immediately; the job itself runs in the background.
/// The task record and its log channel exist (status `starting`) before
/// this responds, so an immediate status poll or stream attach succeeds.
async fn generate_course(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CourseRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let api_key = state.resolve_api_key(&headers)?;

    let task_id = state.registry.create(&request);
    tracing::info!(
        task_id = %task_id,
        course = %request.course_name,
        model = %request.model_name,
        exp_name = %request.exp_name,
        "course generation submitted"
    );

    tokio::spawn(run_generation(
        Arc::clone(&state.registry),
        task_id.clone(),
        request,
        api_key,
        Arc::clone(&state.pipeline),
        state.runner_dirs(),
        Box::new(std::io::stdout()),
    ));

    Ok(Json(GenerateResponse {
        task_id,
        status: "started".to_string(),
        message: "Course generation started".to_string(),
    }))
}

/// GET /api/courses/{task_id}/status — Full task record, or 404.
async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskRecord>> {
    state
        .registry
        .snapshot(&task_id)
        .map(Json)
        .ok_or(ApiError::TaskNotFound(task_id))
}

/// Build the courses router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courses/generate", post(generate_course))
        .route("/courses/{task_id}/status", get(get_task_status))
}
