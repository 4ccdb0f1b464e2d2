// crates/core/src/task.rs
//! Atomic state tracking for a single generation task.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a submitted task (UUID v4, generated at submission).
pub type TaskId = String;

/// Lifecycle status of a generation task.
///
/// Transitions are linear and forward-only:
/// `Pending → Starting → Running → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TaskStatus {
    Pending = 0,
    Starting = 1,
    Running = 2,
    Completed = 3,
    Failed = 4,
}

impl TaskStatus {
    /// Convert a raw `u8` into a status variant.
    /// Returns `None` for values outside the valid range.
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Pending),
            1 => Some(Self::Starting),
            2 => Some(Self::Running),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Request body for submitting a course generation job.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRequest {
    /// Name of the course to generate.
    pub course_name: String,
    /// Model identifier handed to the generation pipeline.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Experiment name scoping the pipeline's output directory.
    #[serde(default = "default_exp_name")]
    pub exp_name: String,
    /// Enable copilot mode in the pipeline.
    #[serde(default)]
    pub copilot: bool,
    /// Name of a previously stored catalog to use.
    #[serde(default)]
    pub catalog: Option<String>,
    /// Inline catalog payload, materialized to a file before the pipeline runs.
    #[serde(default)]
    pub catalog_data: Option<serde_json::Value>,
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_exp_name() -> String {
    "default".to_string()
}

/// Serializable snapshot of a task, returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_stage: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exp_name: String,
    pub course_name: String,
}

/// Shared state for a single task.
///
/// `status` and `progress` use lock-free atomics (the string fields use a
/// `RwLock`) so the running job can update progress while status polls and
/// stream publishers read concurrently. Only the job runner mutates status
/// after submission, which gives the per-task single-writer discipline.
pub struct TaskState {
    id: TaskId,
    course_name: String,
    exp_name: String,
    created_at: DateTime<Utc>,
    status: AtomicU8,
    progress: AtomicU8,
    current_stage: RwLock<String>,
    error: RwLock<Option<String>>,
    updated_at: RwLock<DateTime<Utc>>,
}

impl TaskState {
    /// Create a new task in [`TaskStatus::Pending`] with zero progress.
    pub fn new(id: TaskId, course_name: String, exp_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            course_name,
            exp_name,
            created_at: now,
            status: AtomicU8::new(TaskStatus::Pending as u8),
            progress: AtomicU8::new(0),
            current_stage: RwLock::new("Initializing".to_string()),
            error: RwLock::new(None),
            updated_at: RwLock::new(now),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    pub fn course_name(&self) -> &str {
        &self.course_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        let raw = self.status.load(Ordering::Relaxed);
        TaskStatus::from_u8(raw).unwrap_or(TaskStatus::Failed)
    }

    /// Advance the status. Returns `true` if the transition was applied.
    ///
    /// Transitions are forward-only: a store that would move the status
    /// backward, repeat the current state, or leave a terminal state is
    /// refused rather than applied.
    pub fn advance(&self, next: TaskStatus) -> bool {
        let mut current = self.status.load(Ordering::Relaxed);
        loop {
            let cur = TaskStatus::from_u8(current).unwrap_or(TaskStatus::Failed);
            if cur.is_terminal() || next as u8 <= cur as u8 {
                return false;
            }
            match self.status.compare_exchange(
                current,
                next as u8,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.touch();
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Current progress (0–100).
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Raise progress to `value`. Progress is monotone: a lower value is a no-op.
    pub fn set_progress(&self, value: u8) {
        self.progress.fetch_max(value.min(100), Ordering::Relaxed);
        self.touch();
    }

    /// Overwrite the human-readable stage description.
    pub fn set_stage(&self, stage: impl Into<String>) {
        match self.current_stage.write() {
            Ok(mut guard) => *guard = stage.into(),
            Err(e) => tracing::error!("RwLock poisoned writing stage: {e}"),
        }
        self.touch();
    }

    /// Mark the task completed: terminal status, progress 100.
    pub fn complete(&self) {
        if self.advance(TaskStatus::Completed) {
            self.progress.store(100, Ordering::Relaxed);
            self.set_stage("Completed");
        }
    }

    /// Mark the task failed, recording the error description.
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        if self.advance(TaskStatus::Failed) {
            match self.error.write() {
                Ok(mut guard) => *guard = Some(error.clone()),
                Err(e) => tracing::error!("RwLock poisoned writing error: {e}"),
            }
            self.set_stage(format!("Error: {error}"));
        }
    }

    /// Current error description, if the task failed.
    pub fn error(&self) -> Option<String> {
        self.error.read().ok().and_then(|g| g.clone())
    }

    /// Get a serializable snapshot of the task.
    pub fn snapshot(&self) -> TaskRecord {
        TaskRecord {
            task_id: self.id.clone(),
            status: self.status(),
            progress: self.progress(),
            current_stage: self
                .current_stage
                .read()
                .map(|g| g.clone())
                .unwrap_or_default(),
            error: self.error(),
            created_at: self.created_at,
            updated_at: self
                .updated_at
                .read()
                .map(|g| *g)
                .unwrap_or(self.created_at),
            exp_name: self.exp_name.clone(),
            course_name: self.course_name.clone(),
        }
    }

    fn touch(&self) {
        if let Ok(mut guard) = self.updated_at.write() {
            *guard = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskState {
        TaskState::new(
            "t1".to_string(),
            "Intro to Systems".to_string(),
            "default".to_string(),
        )
    }

    #[test]
    fn test_lifecycle_forward() {
        let state = task();
        assert_eq!(state.status(), TaskStatus::Pending);

        assert!(state.advance(TaskStatus::Starting));
        assert!(state.advance(TaskStatus::Running));
        state.complete();

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.current_stage, "Completed");
    }

    #[test]
    fn test_backward_transition_refused() {
        let state = task();
        assert!(state.advance(TaskStatus::Running));
        assert!(!state.advance(TaskStatus::Starting));
        assert!(!state.advance(TaskStatus::Running));
        assert_eq!(state.status(), TaskStatus::Running);
    }

    #[test]
    fn test_terminal_is_immutable() {
        let state = task();
        state.advance(TaskStatus::Running);
        state.fail("boom");

        assert!(!state.advance(TaskStatus::Completed));
        state.complete();
        assert_eq!(state.status(), TaskStatus::Failed);
        assert_eq!(state.error(), Some("boom".to_string()));
    }

    #[test]
    fn test_fail_records_error_and_stage() {
        let state = task();
        state.advance(TaskStatus::Running);
        state.fail("disk full");

        let snap = state.snapshot();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.error, Some("disk full".to_string()));
        assert_eq!(snap.current_stage, "Error: disk full");
    }

    #[test]
    fn test_progress_is_monotone() {
        let state = task();
        state.set_progress(10);
        state.set_progress(5);
        assert_eq!(state.progress(), 10);
        state.set_progress(200);
        assert_eq!(state.progress(), 100);
    }

    #[test]
    fn test_updated_at_refreshed_on_mutation() {
        let state = task();
        let before = state.snapshot().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        state.set_stage("Loading configuration");
        assert!(state.snapshot().updated_at > before);
    }

    #[test]
    fn test_record_serialization() {
        let state = task();
        state.advance(TaskStatus::Starting);
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        assert!(json.contains("\"task_id\":\"t1\""));
        assert!(json.contains("\"status\":\"starting\""));
        assert!(json.contains("\"error\":null"));
        assert!(json.contains("\"course_name\":\"Intro to Systems\""));
    }

    #[test]
    fn test_course_request_defaults() {
        let req: CourseRequest =
            serde_json::from_str(r#"{"course_name": "Intro to Systems"}"#).unwrap();
        assert_eq!(req.model_name, "gpt-4o-mini");
        assert_eq!(req.exp_name, "default");
        assert!(!req.copilot);
        assert!(req.catalog.is_none());
        assert!(req.catalog_data.is_none());
    }
}
