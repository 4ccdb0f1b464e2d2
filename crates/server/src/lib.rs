// crates/server/src/lib.rs
//! Courseforge server library.
//!
//! This crate provides the Axum-based HTTP server for courseforge. It
//! serves a REST API for submitting course-generation jobs, polling their
//! status, and following their console output live over SSE.

pub mod error;
pub mod routes;
pub mod state;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, courses, logs, results, tasks, catalog)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Test support
// ============================================================================


// ============================================================================
// Integration Tests
// ============================================================================
