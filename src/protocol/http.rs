//! HTTP + SSE protocol adapter.
//!
//! `POST /mcp` accepts one [`super::ToolCall`] as a JSON body and streams
//! back a single Server-Sent Event carrying the [`super::ToolResponse`].
//! `GET /health` reports liveness plus current graph counts. Static assets
//! (if a `public_dir` is configured) are served under `/`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use super::{dispatch, ToolCall};
use crate::graph::PulseHive;

/// Builds the axum router for the HTTP adapter. `public_dir`, if given, is
/// served as static files under `/`.
pub fn router(graph: Arc<PulseHive>, public_dir: Option<&std::path::Path>) -> Router {
    let mut router = Router::new()
        .route("/mcp", post(handle_tool_call))
        .route("/health", get(handle_health))
        .with_state(graph)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    if let Some(dir) = public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router
}

#[instrument(skip(graph, call))]
async fn handle_tool_call(
    State(graph): State<Arc<PulseHive>>,
    Json(call): Json<ToolCall>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let response = tokio::task::block_in_place(|| dispatch(&graph, call));
    let event = Event::default().json_data(&response).unwrap_or_else(|_| {
        Event::default().data(r#"{"status":"error","error":{"error":"internal","detail":"serialization failure"}}"#)
    });
    Sse::new(stream::iter(vec![Ok(event)]))
}

async fn handle_health(State(graph): State<Arc<PulseHive>>) -> impl IntoResponse {
    match graph.get_stats() {
        Ok(stats) => Json(json!({ "status": "ok", "stats": stats })).into_response(),
        Err(e) => Json(json!({ "status": "error", "detail": e.to_string() })).into_response(),
    }
}
