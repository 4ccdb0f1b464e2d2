// crates/server/src/state.rs
//! Application state for the Axum server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use courseforge_core::{GenerationPipeline, RunnerDirs, TaskRegistry};

use crate::error::ApiError;

/// Request header carrying a per-request OpenAI API key.
pub const API_KEY_HEADER: &str = "x-openai-api-key";

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Authoritative task and log-channel store.
    pub registry: Arc<TaskRegistry>,
    /// The generation workflow invoked for each submitted task.
    pub pipeline: Arc<dyn GenerationPipeline>,
    /// Process-wide default API key, used when a request carries none.
    pub default_api_key: Option<String>,
    /// Directory the workflow writes results under (one subdir per experiment).
    pub output_dir: PathBuf,
    /// Directory uploaded and materialized catalogs are stored in.
    pub catalog_dir: PathBuf,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(
        pipeline: Arc<dyn GenerationPipeline>,
        default_api_key: Option<String>,
        output_dir: PathBuf,
        catalog_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            registry: Arc::new(TaskRegistry::new()),
            pipeline,
            default_api_key,
            output_dir,
            catalog_dir,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Resolve the API key for a request: header first, then the
    /// process-wide default. The core only ever sees the resolved value.
    pub fn resolve_api_key(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        if let Some(value) = headers.get(API_KEY_HEADER) {
            if let Ok(key) = value.to_str() {
                if !key.is_empty() {
                    return Ok(key.to_string());
                }
            }
        }
        self.default_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::MissingApiKey)
    }

    /// Filesystem locations handed to the job runner.
    pub fn runner_dirs(&self) -> RunnerDirs {
        RunnerDirs {
            output_dir: self.output_dir.clone(),
            catalog_dir: self.catalog_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use courseforge_core::{PipelineError, PipelineSpec};

    struct NoopPipeline;

    impl GenerationPipeline for NoopPipeline {
        fn run(
            &self,
            _spec: &PipelineSpec,
            _credential: &str,
            _output: &mut dyn std::io::Write,
        ) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn state(default_key: Option<&str>) -> Arc<AppState> {
        AppState::new(
            Arc::new(NoopPipeline),
            default_key.map(str::to_string),
            PathBuf::from("./exp"),
            PathBuf::from("./catalog"),
        )
    }

    #[test]
    fn test_header_key_wins_over_default() {
        let state = state(Some("sk-default"));
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sk-header"));

        assert_eq!(state.resolve_api_key(&headers).unwrap(), "sk-header");
    }

    #[test]
    fn test_default_key_used_without_header() {
        let state = state(Some("sk-default"));
        assert_eq!(
            state.resolve_api_key(&HeaderMap::new()).unwrap(),
            "sk-default"
        );
    }

    #[test]
    fn test_no_key_anywhere_is_an_error() {
        let state = state(None);
        assert!(matches!(
            state.resolve_api_key(&HeaderMap::new()),
            Err(ApiError::MissingApiKey)
        ));
    }

    #[test]
    fn test_empty_header_falls_back() {
        let state = state(Some("sk-default"));
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(""));

        assert_eq!(
            state.resolve_api_key(&headers).unwrap(),
            "sk-default"
        );
    }

    #[test]
    fn test_uptime() {
        let state = state(None);
        assert!(state.uptime_secs() < 5);
    }
}
