//! Tile lookup through the cache.
//!
//! Every response body is rendered at most once per backing file: the cache
//! key names the artifact path and the entry remembers the artifact's
//! fingerprint, so a newly promoted file forces a re-render.

use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use storage::{tile_cache_key, MbTiles};
use tracing::{debug, instrument};
use weather_common::{ArtifactFormat, TileCoord, WeatherError, WeatherResult};

use crate::state::AppState;

/// What a tile request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Gzip'd vector tile from the published archive
    Vector,
    /// PNG warped from the published raster
    Image,
    /// Value band at the tile center, as JSON
    Value,
}

impl TileKind {
    pub fn format(&self) -> ArtifactFormat {
        match self {
            TileKind::Vector => ArtifactFormat::Vector,
            TileKind::Image | TileKind::Value => ArtifactFormat::Raster,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TileKind::Vector => "application/x-protobuf",
            TileKind::Image => "image/png",
            TileKind::Value => "application/json",
        }
    }

    fn key_suffix(&self) -> &'static str {
        match self {
            TileKind::Vector => ":pbf",
            TileKind::Image => "",
            TileKind::Value => ":value",
        }
    }
}

impl FromStr for TileKind {
    type Err = WeatherError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        match ext {
            "pbf" => Ok(TileKind::Vector),
            "png" => Ok(TileKind::Image),
            "json" => Ok(TileKind::Value),
            other => Err(WeatherError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Whether a response came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Tile body for `layer`/`hour` from the published run.
#[instrument(skip(state))]
pub async fn load_tile(
    state: &AppState,
    layer: &str,
    hour: &str,
    tile: &TileCoord,
    kind: TileKind,
) -> WeatherResult<(Bytes, CacheStatus)> {
    let model = &state.model.model;
    let artifact = state
        .layout
        .published_artifact(model, layer, hour, kind.format())
        .await?
        .ok_or_else(|| WeatherError::DataNotAvailable(format!("{} {} {}", model, layer, hour)))?;

    cached_tile(state, &artifact, tile, kind).await
}

/// Render or fetch one tile of `artifact`, going through the cache.
pub async fn cached_tile(
    state: &AppState,
    artifact: &Path,
    tile: &TileCoord,
    kind: TileKind,
) -> WeatherResult<(Bytes, CacheStatus)> {
    let key = format!("{}{}", tile_cache_key(artifact, tile), kind.key_suffix());

    if let Some(data) = state.cache.get(&key, artifact).await {
        metrics::counter!("tile_cache_hits_total").increment(1);
        return Ok((data, CacheStatus::Hit));
    }
    metrics::counter!("tile_cache_misses_total").increment(1);

    let data = render(state, artifact, tile, kind).await?;
    state.cache.put(&key, artifact, data.clone()).await;
    debug!(key = %key, bytes = data.len(), "Cached tile");
    Ok((data, CacheStatus::Miss))
}

async fn render(state: &AppState, artifact: &Path, tile: &TileCoord, kind: TileKind) -> WeatherResult<Bytes> {
    let render_error = |e: renderer::RenderError| WeatherError::RenderError(e.to_string());
    match kind {
        TileKind::Vector => {
            let archive = MbTiles::open(artifact).await?;
            let data = archive.tile(tile).await;
            archive.close().await;
            data?.ok_or_else(|| WeatherError::DataNotAvailable(format!("tile {}", tile.cache_key())))
        }
        TileKind::Image => state.engine.warp_to_tile(artifact, tile).await.map_err(render_error),
        TileKind::Value => {
            let value = state
                .engine
                .warp_to_value(artifact, tile)
                .await
                .map_err(render_error)?;
            Ok(Bytes::from(serde_json::to_vec(&serde_json::json!({ "value": value }))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!("pbf".parse::<TileKind>().unwrap(), TileKind::Vector);
        assert_eq!("png".parse::<TileKind>().unwrap(), TileKind::Image);
        assert_eq!("json".parse::<TileKind>().unwrap(), TileKind::Value);
        assert!(matches!(
            "jpg".parse::<TileKind>(),
            Err(WeatherError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_formats() {
        assert_eq!(TileKind::Vector.format(), ArtifactFormat::Vector);
        assert_eq!(TileKind::Value.format(), ArtifactFormat::Raster);
        assert_eq!(TileKind::Image.content_type(), "image/png");
    }
}
