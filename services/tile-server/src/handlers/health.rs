//! Liveness, palettes and Prometheus metrics.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::instrument;

use crate::state::AppState;

/// GET /up
pub async fn up_handler() -> impl IntoResponse {
    (StatusCode::OK, "ha ha ha ha staying alive")
}

/// GET /palettes.json
pub async fn palettes_handler(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.palettes.to_json())
}

/// GET /metrics
#[instrument(skip(state))]
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let stats = state.cache.stats();
    let mut output = state.metrics.render();

    output.push_str(&format!(
        "# HELP tile_cache_entries Current tile cache entries\n# TYPE tile_cache_entries gauge\ntile_cache_entries {}\n",
        stats.entries
    ));
    output.push_str(&format!(
        "# HELP tile_cache_hit_rate Tile cache hit rate in percent\n# TYPE tile_cache_hit_rate gauge\ntile_cache_hit_rate {:.2}\n",
        stats.hit_rate()
    ));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(output.into())
        .unwrap()
}
