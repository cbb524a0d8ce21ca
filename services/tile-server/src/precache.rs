//! Cache warming after a run is promoted.
//!
//! Renders the low-zoom tiles of every promoted raster over the served
//! area through the regular cache path, in small batches.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use weather_common::tile::tiles_in_bbox;
use weather_common::{ArtifactFormat, BoundingBox, ProcessedArtifact, TileCoord};

use crate::state::AppState;
use crate::tiles::{cached_tile, TileKind};

/// Warmed area as `(min_lon, min_lat, max_lon, max_lat)`.
pub const PRECACHE_BBOX: (f64, f64, f64, f64) = (-12.7368, 37.3313, 12.9982, 55.9485);
pub const PRECACHE_ZOOMS: std::ops::RangeInclusive<u32> = 5..=6;
const BATCH_SIZE: usize = 100;
const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Tiles warmed for each raster.
pub fn precache_tiles() -> Vec<TileCoord> {
    let (min_lon, min_lat, max_lon, max_lat) = PRECACHE_BBOX;
    let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat);
    PRECACHE_ZOOMS.flat_map(|z| tiles_in_bbox(&bbox, z)).collect()
}

/// Warm the cache for the promoted files `names`; returns the tiles rendered.
pub async fn warm_promoted(state: Arc<AppState>, names: Vec<String>) -> usize {
    let rasters: Vec<ProcessedArtifact> = names
        .iter()
        .filter_map(|name| ProcessedArtifact::parse(name))
        .filter(|a| a.format == ArtifactFormat::Raster)
        .collect();
    if rasters.is_empty() {
        return 0;
    }

    let tiles = precache_tiles();
    info!(rasters = rasters.len(), tiles = tiles.len(), "Pre-caching promoted run");

    let mut rendered = 0;
    for artifact in &rasters {
        let path = artifact.path_in(state.layout.storage_dir());
        'batches: for batch in tiles.chunks(BATCH_SIZE) {
            for tile in batch {
                match cached_tile(&state, &path, tile, TileKind::Image).await {
                    Ok(_) => rendered += 1,
                    Err(e) => {
                        warn!(file = %artifact.file_name(), error = %e, "Pre-caching stopped for artifact");
                        break 'batches;
                    }
                }
            }
            tokio::time::sleep(BATCH_PAUSE).await;
        }
        debug!(file = %artifact.file_name(), "Pre-cached artifact");
    }

    info!(rendered, "Pre-caching complete");
    rendered
}
