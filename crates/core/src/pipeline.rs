// crates/core/src/pipeline.rs
//! Boundary to the external course-generation workflow.
//!
//! The workflow itself is an opaque, long-running call that prints progress
//! as it goes. The runner hands it a writer (the task's
//! [`OutputBridge`](crate::OutputBridge)) instead of letting it grab a
//! global output sink, so several jobs can capture output concurrently.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::PipelineError;

/// Fully-resolved inputs for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub course_name: String,
    pub model_name: String,
    pub exp_name: String,
    /// Copilot profile name, when copilot mode is enabled.
    pub copilot: Option<String>,
    /// Catalog name (stored or materialized from an inline payload).
    pub catalog: Option<String>,
    /// Directory the workflow writes its results under.
    pub output_dir: PathBuf,
}

/// The external generation workflow.
///
/// `run` blocks for the duration of the workflow (seconds to tens of
/// minutes) and is always invoked from a blocking thread. Everything the
/// workflow prints must go through `output`.
pub trait GenerationPipeline: Send + Sync {
    fn run(
        &self,
        spec: &PipelineSpec,
        credential: &str,
        output: &mut dyn Write,
    ) -> Result<(), PipelineError>;
}

/// Production pipeline: shells out to the instructional-design workflow.
///
/// The child's stdout is streamed into `output` as it is produced; stderr is
/// inherited so operator-facing diagnostics stay on the raw process output.
/// The credential is scoped to the child via its environment, never this
/// process's.
pub struct CommandPipeline {
    program: String,
    base_args: Vec<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Parse a full command line ("python3 run.py") into program + args.
    /// Returns `None` for a blank command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl GenerationPipeline for CommandPipeline {
    fn run(
        &self,
        spec: &PipelineSpec,
        credential: &str,
        output: &mut dyn Write,
    ) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg("--course")
            .arg(&spec.course_name)
            .arg("--model")
            .arg(&spec.model_name)
            .arg("--exp-name")
            .arg(&spec.exp_name)
            .arg("--output-dir")
            .arg(&spec.output_dir)
            .env("OPENAI_API_KEY", credential)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(catalog) = &spec.catalog {
            command.arg("--catalog").arg(catalog);
        }
        if let Some(copilot) = &spec.copilot {
            command.arg("--copilot").arg(copilot);
        }

        let mut child = command.spawn().map_err(|source| PipelineError::Spawn {
            command: self.program.clone(),
            source,
        })?;

        // Stream child stdout chunk by chunk; the bridge handles line splits.
        if let Some(mut stdout) = child.stdout.take() {
            let mut buf = [0u8; 8192];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                output.write_all(&buf[..n])?;
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(PipelineError::CommandFailed { status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PipelineSpec {
        PipelineSpec {
            course_name: "Intro to Systems".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            exp_name: "default".to_string(),
            copilot: None,
            catalog: None,
            output_dir: PathBuf::from("./exp"),
        }
    }

    #[test]
    fn test_from_command_line() {
        let pipeline = CommandPipeline::from_command_line("python3 run.py --quiet").unwrap();
        assert_eq!(pipeline.program, "python3");
        assert_eq!(pipeline.base_args, vec!["--quiet"]);

        assert!(CommandPipeline::from_command_line("   ").is_none());
    }

    #[test]
    fn test_spawn_failure_names_the_command() {
        let pipeline = CommandPipeline::new("courseforge-no-such-binary", Vec::new());
        let mut out = Vec::new();
        let err = pipeline.run(&spec(), "sk-test", &mut out).unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { .. }));
        assert!(err.to_string().contains("courseforge-no-such-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_child_stdout_is_streamed_to_output() {
        // `sh -c` ignores the generation flags appended after the script.
        let pipeline = CommandPipeline::new(
            "sh",
            vec!["-c".to_string(), "echo from-the-pipeline".to_string()],
        );
        let mut out = Vec::new();
        pipeline.run(&spec(), "sk-test", &mut out).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("from-the-pipeline"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_an_error() {
        let pipeline = CommandPipeline::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let mut out = Vec::new();
        let err = pipeline.run(&spec(), "sk-test", &mut out).unwrap_err();
        assert!(matches!(err, PipelineError::CommandFailed { .. }));
    }
}
