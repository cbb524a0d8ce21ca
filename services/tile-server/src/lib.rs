//! Weather tile server library.
//!
//! Serves tiles of the published runs and receives runs rolled out by
//! workers. Modules are public for the integration tests.

pub mod handlers;
pub mod precache;
pub mod state;
pub mod sweep;
pub mod tiles;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Largest accepted rollout upload.
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Build the router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .host_origin
        .parse()
        .with_context(|| format!("Invalid HOST_ORIGIN {}", state.config.host_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/tiles/:layer/:hour/:z/:x/:tile", get(handlers::tile_handler))
        .route("/metadata.json", get(handlers::metadata_handler))
        .route("/palettes.json", get(handlers::palettes_handler))
        .route("/up", get(handlers::up_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/rollout",
            post(handlers::rollout_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
