// HTTP routes: index page, node snapshot JSON, cache status

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::k8s::cache::{CacheStats, SnapshotCache};
use crate::model::FetchWarning;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) cache: SnapshotCache,
    /// Upper bound on how long a request waits for the first snapshot
    pub(crate) populate_timeout: Duration,
}

pub fn app(cache: SnapshotCache, populate_timeout: Duration) -> Router {
    let state = AppState {
        cache,
        populate_timeout,
    };
    Router::new()
        .route("/", get(index_handler))
        .route("/api/nodes", get(nodes_handler))
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/nodes: ordered nodes with their pods' aggregated requests.
async fn nodes_handler(State(state): State<AppState>) -> Response {
    match state.cache.get_within(state.populate_timeout).await {
        Ok(snapshot) => Json(&snapshot.nodes).into_response(),
        Err(e) => {
            error!("Serving /api/nodes: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(flatten)]
    stats: CacheStats,
    produced_at: Option<chrono::DateTime<chrono::Utc>>,
    warnings: Vec<FetchWarning>,
}

/// GET /api/status: cache state and the last refresh error, never blocks.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats().await;
    let snapshot = state.cache.peek().await;

    Json(StatusBody {
        stats,
        produced_at: snapshot.as_ref().map(|s| s.produced_at),
        warnings: snapshot.map(|s| s.warnings.clone()).unwrap_or_default(),
    })
}
