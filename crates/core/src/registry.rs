// crates/core/src/registry.rs
//! Authoritative store for task records and their log channels.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::logs::LogChannel;
use crate::task::{CourseRequest, TaskId, TaskRecord, TaskState, TaskStatus};

/// Owns every [`TaskState`] and [`LogChannel`] for the process lifetime.
///
/// Submission, the running job, status polls, and stream publishers all hit
/// this concurrently. The maps are guarded by `std::sync::RwLock` (no lock
/// held across an `.await`); per-task fields are synchronized inside
/// `TaskState` itself, so unrelated tasks never contend on each other.
///
/// Nothing is evicted: completed tasks and their logs stay readable until
/// the process exits (retention policy left open, see DESIGN.md).
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskState>>>,
    channels: RwLock<HashMap<TaskId, Arc<LogChannel>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a task for `request` and return its id.
    ///
    /// The record and its (empty) log channel are both addressable before
    /// this returns, and the record is already in `starting`: a status poll
    /// or stream attach issued immediately after submission always finds
    /// the task.
    pub fn create(&self, request: &CourseRequest) -> TaskId {
        let id = uuid::Uuid::new_v4().to_string();
        let state = Arc::new(TaskState::new(
            id.clone(),
            request.course_name.clone(),
            request.exp_name.clone(),
        ));

        match self.channels.write() {
            Ok(mut channels) => {
                channels.insert(id.clone(), Arc::new(LogChannel::new()));
            }
            Err(e) => tracing::error!("RwLock poisoned writing channels map: {e}"),
        }
        match self.tasks.write() {
            Ok(mut tasks) => {
                tasks.insert(id.clone(), Arc::clone(&state));
            }
            Err(e) => tracing::error!("RwLock poisoned writing tasks map: {e}"),
        }

        // Queued-for-execution, synchronously, before the submitter gets a
        // response.
        state.advance(TaskStatus::Starting);
        state.set_stage("Task queued, initializing...");
        id
    }

    /// Look up a task's shared state.
    pub fn get(&self, id: &str) -> Option<Arc<TaskState>> {
        match self.tasks.read() {
            Ok(tasks) => tasks.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading tasks map: {e}");
                None
            }
        }
    }

    /// Serializable snapshot of one task.
    pub fn snapshot(&self, id: &str) -> Option<TaskRecord> {
        self.get(id).map(|t| t.snapshot())
    }

    /// Look up a task's log channel.
    pub fn channel(&self, id: &str) -> Option<Arc<LogChannel>> {
        match self.channels.read() {
            Ok(channels) => channels.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading channels map: {e}");
                None
            }
        }
    }

    /// Snapshots of all tasks, newest first by creation time.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = match self.tasks.read() {
            Ok(tasks) => tasks.values().map(|t| t.snapshot()).collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading tasks map: {e}");
                Vec::new()
            }
        };
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.tasks.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
