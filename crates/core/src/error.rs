// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a generation pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to launch pipeline command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline command exited with {status}")]
    CommandFailed { status: std::process::ExitStatus },

    #[error("pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Workflow(String),
}

/// Errors that can occur while driving a generation task.
///
/// These never escape the job runner as panics; each one ends the task in
/// `failed` with its description recorded on the task record.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("OpenAI API key is required and cannot be empty")]
    EmptyCredential,

    #[error("log channel unavailable for task {task_id}")]
    ChannelUnavailable { task_id: String },

    #[error("failed to write catalog payload to {path}: {source}")]
    CatalogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_is_transparent() {
        let err = GenerationError::from(PipelineError::Workflow("disk full".to_string()));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_catalog_write_includes_path() {
        let err = GenerationError::CatalogWrite {
            path: PathBuf::from("/tmp/catalog/temp_t1.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("temp_t1.json"));
    }
}
