// crates/core/src/runner.rs
//! Drives one submitted task through its lifecycle.
//!
//! The runner is the only component that mutates a task's status, progress,
//! or stage after submission, and the only caller of the generation
//! pipeline. The pipeline call itself is blocking and runs on the blocking
//! thread pool; the output bridge installed around it is scoped to that
//! call, so concurrent jobs capture their own output independently.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::capture::OutputBridge;
use crate::error::GenerationError;
use crate::pipeline::{GenerationPipeline, PipelineSpec};
use crate::registry::TaskRegistry;
use crate::task::{CourseRequest, TaskId, TaskStatus};

/// Filesystem locations the runner materializes inputs into and the
/// pipeline writes results under.
#[derive(Debug, Clone)]
pub struct RunnerDirs {
    pub output_dir: PathBuf,
    pub catalog_dir: PathBuf,
}

/// Run the generation workflow for `task_id`, recording the outcome on the
/// task record.
///
/// `sink` is the original output destination (stdout in production); every
/// byte the job prints is forwarded there as well as captured into the
/// task's log channel. All failure paths end in `failed` with a recorded
/// description — this function never panics the caller and never retries.
pub async fn run_generation(
    registry: Arc<TaskRegistry>,
    task_id: TaskId,
    request: CourseRequest,
    credential: String,
    pipeline: Arc<dyn GenerationPipeline>,
    dirs: RunnerDirs,
    sink: Box<dyn Write + Send>,
) {
    let Some(task) = registry.get(&task_id) else {
        // Termination races are expected; dropping the run is not fatal.
        tracing::warn!(task_id = %task_id, "task removed before the runner started");
        return;
    };

    task.advance(TaskStatus::Starting);
    task.set_progress(1);
    task.set_stage("Initializing task");

    if credential.trim().is_empty() {
        let err = GenerationError::EmptyCredential;
        tracing::error!(task_id = %task_id, error = %err, "generation setup failed");
        task.fail(err.to_string());
        return;
    }

    let Some(channel) = registry.channel(&task_id) else {
        let err = GenerationError::ChannelUnavailable {
            task_id: task_id.clone(),
        };
        tracing::error!(task_id = %task_id, error = %err, "generation setup failed");
        task.fail(err.to_string());
        return;
    };

    let worker_task = Arc::clone(&task);
    let worker = tokio::task::spawn_blocking(move || {
        // The bridge lives for the whole blocking section; dropping it
        // flushes the trailing fragment on every exit path.
        let mut bridge = OutputBridge::new(channel, sink);

        worker_task.advance(TaskStatus::Running);
        worker_task.set_progress(5);
        worker_task.set_stage("Loading configuration");

        let _ = writeln!(bridge, "Starting course generation...");
        let _ = writeln!(bridge, "Course: {}", request.course_name);
        let _ = writeln!(bridge, "Model: {}", request.model_name);
        let _ = writeln!(bridge, "Experiment: {}", request.exp_name);
        let _ = writeln!(bridge, "{}", "=".repeat(60));

        let result: Result<(), GenerationError> = (|| {
            let catalog = materialize_catalog(&request, worker_task.id(), &dirs.catalog_dir)?;

            worker_task.set_progress(10);
            worker_task.set_stage("Starting workflow");

            let spec = PipelineSpec {
                course_name: request.course_name.clone(),
                model_name: request.model_name.clone(),
                exp_name: request.exp_name.clone(),
                copilot: request.copilot.then(|| "default_copilot".to_string()),
                catalog,
                output_dir: dirs.output_dir.clone(),
            };

            pipeline
                .run(&spec, &credential, &mut bridge)
                .map_err(GenerationError::from)
        })();

        match result {
            Ok(()) => {
                let _ = writeln!(bridge, "{}", "=".repeat(60));
                let _ = writeln!(bridge, "Course generation completed successfully");
                Ok(())
            }
            Err(e) => {
                // Full diagnostic through the bridge so stream observers see
                // why the task died, not just the status poll.
                write_diagnostic(&mut bridge, &e);
                Err(e)
            }
        }
    });

    // The terminal status is recorded only after the worker (and with it the
    // bridge flush) has finished, so every log line precedes `complete` on
    // any stream.
    match worker.await {
        Ok(Ok(())) => {
            task.complete();
            tracing::info!(task_id = %task_id, "course generation completed");
        }
        Ok(Err(e)) => {
            tracing::error!(task_id = %task_id, error = %e, "course generation failed");
            task.fail(e.to_string());
        }
        Err(join_err) => {
            tracing::error!(task_id = %task_id, error = %join_err, "generation worker panicked");
            task.fail(format!("generation worker panicked: {join_err}"));
        }
    }
}

/// Write an error and its cause chain as log lines.
fn write_diagnostic(out: &mut dyn Write, err: &GenerationError) {
    let _ = writeln!(out, "Error: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let _ = writeln!(out, "  caused by: {cause}");
        source = cause.source();
    }
}

/// Resolve the catalog input for a request.
///
/// An inline `catalog_data` payload is written to
/// `<catalog_dir>/temp_<task_id>.json` and referenced by name, since the
/// workflow expects a named catalog rather than inline data. Otherwise the
/// caller-supplied catalog name (if any) passes through.
fn materialize_catalog(
    request: &CourseRequest,
    task_id: &str,
    catalog_dir: &Path,
) -> Result<Option<String>, GenerationError> {
    let Some(data) = &request.catalog_data else {
        return Ok(request.catalog.clone());
    };

    let name = format!("temp_{task_id}");
    let path = catalog_dir.join(format!("{name}.json"));
    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(catalog_dir)?;
        let payload = serde_json::to_string_pretty(data).map_err(std::io::Error::other)?;
        std::fs::write(&path, payload)
    };
    write().map_err(|source| GenerationError::CatalogWrite {
        path: path.clone(),
        source,
    })?;
    Ok(Some(name))
}
