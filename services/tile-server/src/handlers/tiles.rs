//! `GET /tiles/{layer}/{hour}/{z}/{x}/{y}.{ext}`

use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::{header, StatusCode};
use axum::response::Response;
use tracing::instrument;
use weather_common::artifact::{is_hour, is_safe_component};
use weather_common::TileCoord;

use super::error::ApiError;
use crate::state::AppState;
use crate::tiles::{load_tile, TileKind};

const CACHE_CONTROL: &str = "public, max-age=3600";

/// Parsed tile path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub layer: String,
    pub hour: String,
    pub tile: TileCoord,
    pub kind: TileKind,
}

impl TileRequest {
    /// Validate raw path segments; `file` is `{y}.{ext}`.
    pub fn parse(layer: &str, hour: &str, z: &str, x: &str, file: &str) -> Result<Self, ApiError> {
        if !is_safe_component(layer) {
            return Err(ApiError::BadRequest(format!("Invalid layer: {}", layer)));
        }
        if !is_hour(hour) {
            return Err(ApiError::BadRequest(format!("Invalid hour: {}", hour)));
        }

        let (y, ext) = file
            .rsplit_once('.')
            .ok_or_else(|| ApiError::BadRequest(format!("Missing extension: {}", file)))?;
        let kind: TileKind = ext.parse()?;

        let coord = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid tile coordinate: {}", s)))
        };
        let (z, x, y) = (coord(z)?, coord(x)?, coord(y)?);
        let tile = TileCoord::checked(z, x, y)
            .ok_or_else(|| ApiError::BadRequest(format!("Tile {}/{}/{} out of range", z, x, y)))?;

        Ok(Self {
            layer: layer.to_string(),
            hour: hour.to_string(),
            tile,
            kind,
        })
    }
}

#[instrument(skip(state))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((layer, hour, z, x, file)): Path<(String, String, String, String, String)>,
) -> Result<Response, ApiError> {
    let request = TileRequest::parse(&layer, &hour, &z, &x, &file)?;
    let (data, cache) = load_tile(&state, &request.layer, &request.hour, &request.tile, request.kind).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, request.kind.content_type())
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .header("X-Cache", cache.as_str());
    if request.kind == TileKind::Vector {
        builder = builder.header(header::CONTENT_ENCODING, "gzip");
    }

    Ok(builder.body(data.into()).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_request() {
        let request = TileRequest::parse("temperature", "07", "6", "32", "22.png").unwrap();
        assert_eq!(request.tile, TileCoord::new(6, 32, 22));
        assert_eq!(request.kind, TileKind::Image);
    }

    #[test]
    fn test_rejects_bad_requests() {
        assert!(TileRequest::parse("temperature", "07", "6", "32", "22.gif").is_err());
        assert!(TileRequest::parse("temperature", "07", "6", "32", "22").is_err());
        assert!(TileRequest::parse("temperature", "07", "6", "64", "22.png").is_err());
        assert!(TileRequest::parse("temperature", "7", "6", "32", "22.png").is_err());
        assert!(TileRequest::parse("../etc", "07", "6", "32", "22.png").is_err());
        assert!(TileRequest::parse("temperature", "07", "z", "32", "22.png").is_err());
    }
}
