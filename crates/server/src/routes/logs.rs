// crates/server/src/routes/logs.rs
//! Live log streaming over Server-Sent Events.
//!
//! - `GET /api/courses/{task_id}/logs/stream` — follow one task's output

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;

/// How many queued lines one iteration drains before yielding.
const LOG_BATCH_SIZE: usize = 20;

/// Pause between iterations while backlog is still draining.
const DRAIN_YIELD: Duration = Duration::from_millis(10);

/// Pause between iterations when the task is live but quiet.
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(300);

/// GET /api/courses/{task_id}/logs/stream — SSE stream of one task's logs.
///
/// # Events
///
/// | Event name | When emitted                                        |
/// |------------|-----------------------------------------------------|
/// | `connected`| Exactly once, immediately on attach                 |
/// | `log`      | One previously-unseen line, with delivery timestamp |
/// | `complete` | Task reached a terminal state; stream closes after  |
/// | `error`    | Transport-level failure; stream closes after        |
///
/// Every observer gets its own cursor over the task's full log history, so
/// attaching (or disconnecting) never affects the job or other observers.
/// The drain check runs before the terminal check on each iteration, which
/// guarantees all `log` events precede the single `complete` event.
pub async fn stream_task_logs(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let channel = state
        .registry
        .channel(&task_id)
        .ok_or_else(|| ApiError::TaskNotFound(task_id.clone()))?;
    let registry = Arc::clone(&state.registry);
    let mut cursor = channel.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data(
            serde_json::json!({"message": "Log stream connected"}).to_string(),
        ));

        loop {
            let batch = cursor.next_batch(LOG_BATCH_SIZE);
            if !batch.is_empty() {
                for line in batch {
                    yield Ok(Event::default().event("log").data(
                        serde_json::json!({
                            "message": line,
                            "timestamp": chrono::Utc::now().to_rfc3339(),
                        })
                        .to_string(),
                    ));
                }
                // Backlog may remain; come back almost immediately.
                tokio::time::sleep(DRAIN_YIELD).await;
                continue;
            }

            match registry.get(&task_id) {
                Some(task) if task.status().is_terminal() => {
                    yield Ok(Event::default().event("complete").data(
                        serde_json::json!({"status": task.status()}).to_string(),
                    ));
                    break;
                }
                Some(_) => {
                    tokio::time::sleep(HEARTBEAT_INTERVAL).await;
                }
                None => {
                    tracing::warn!(task_id = %task_id, "task removed while a stream was attached");
                    yield Ok(Event::default().event("error").data(
                        serde_json::json!({"message": "Task removed while streaming"}).to_string(),
                    ));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// Build the log streaming router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/courses/{task_id}/logs/stream", get(stream_task_logs))
}
