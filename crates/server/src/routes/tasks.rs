// crates/server/src/routes/tasks.rs
//! Task listing endpoint.
//!
//! - `GET /api/tasks/list` — summaries of every task, newest first

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use courseforge_core::TaskStatus;

use crate::state::AppState;

/// One task in the listing.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub course_name: String,
    pub exp_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub progress: u8,
    /// Lines currently held by the task's log channel.
    pub log_queue_size: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub total: usize,
    pub tasks: Vec<TaskSummary>,
}

/// GET /api/tasks/list — all tasks, newest first by creation time.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    let tasks: Vec<TaskSummary> = state
        .registry
        .list()
        .into_iter()
        .map(|record| TaskSummary {
            log_queue_size: state
                .registry
                .channel(&record.task_id)
                .map(|c| c.len())
                .unwrap_or(0),
            task_id: record.task_id,
            status: record.status,
            course_name: record.course_name,
            exp_name: record.exp_name,
            created_at: record.created_at,
            updated_at: record.updated_at,
            progress: record.progress,
        })
        .collect();

    Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    })
}

/// Build the tasks router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/list", get(list_tasks))
}
