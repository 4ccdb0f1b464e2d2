//! API route handlers for the courseforge server.

pub mod catalog;
pub mod courses;
pub mod health;
pub mod logs;
pub mod results;
pub mod tasks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/courses/generate - Submit a generation job
/// - GET  /api/courses/:task_id/status - Poll one task's record
/// - GET  /api/courses/:task_id/logs/stream - SSE stream of the task's logs
/// - GET  /api/courses/:task_id/results/files - List generated files
/// - GET  /api/courses/:task_id/results/download/*path - Download one file
/// - GET  /api/tasks/list - Summaries of every task, newest first
/// - POST /api/catalog/upload - Store a catalog document
/// - GET  /api/catalog/list - List stored catalogs
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", courses::router())
        .nest("/api", logs::router())
        .nest("/api", results::router())
        .nest("/api", tasks::router())
        .nest("/api", catalog::router())
        .with_state(state)
}
