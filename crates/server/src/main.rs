// crates/server/src/main.rs
//! Courseforge server binary.
//!
//! Parses the CLI, wires the generation pipeline into the shared state, and
//! serves the API. Submitted jobs run in the background; the HTTP layer
//! never blocks on them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use courseforge_core::CommandPipeline;
use courseforge_server::{create_app, AppState};

/// Default port for the server.
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Parser)]
#[command(name = "courseforge", about = "Course generation API server", version)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on. COURSEFORGE_PORT or PORT override the default.
    #[arg(long)]
    port: Option<u16>,

    /// Directory the generation workflow writes results under.
    #[arg(long, default_value = "./exp")]
    output_dir: PathBuf,

    /// Directory catalogs are stored in.
    #[arg(long, default_value = "./catalog")]
    catalog_dir: PathBuf,

    /// Command line for the generation workflow.
    #[arg(long, default_value = "python3 run.py")]
    pipeline_cmd: String,
}

/// Get the server port: flag, then COURSEFORGE_PORT, then PORT, then default.
fn get_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| {
        std::env::var("COURSEFORGE_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
    })
    .unwrap_or(DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courseforge=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let pipeline = CommandPipeline::from_command_line(&args.pipeline_cmd)
        .context("--pipeline-cmd must not be empty")?;

    // Per-request keys override this; without it the server runs degraded
    // and every submission must carry its own key.
    let default_api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    if default_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; requests must supply X-OpenAI-API-Key");
    }

    let state = AppState::new(
        Arc::new(pipeline),
        default_api_key,
        args.output_dir,
        args.catalog_dir,
    );
    let app = create_app(state);

    let port = get_port(args.port);
    let addr: SocketAddr = format!("{}:{}", args.host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "courseforge server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
