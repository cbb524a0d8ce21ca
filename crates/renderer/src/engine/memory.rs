//! In-process rendering without external tools.
//!
//! Rasters are stored as JSON-serialized [`RasterGrid`]s under the usual
//! `_cog.tif` name and tiles are produced by sampling the bands per pixel.
//! Vector archives are real MBTiles files whose tiles hold gzip'd GeoJSON
//! rather than protobuf.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use rayon::prelude::*;
use serde::Deserialize;
use storage::mbtiles::{gzip, MbTiles};
use tokio::fs;
use weather_common::tile::{latlon_to_tile, ORIGIN_SHIFT, TILE_SIZE};
use weather_common::{ProcessedArtifact, TileCoord};

use super::RenderEngine;
use crate::error::{RenderError, Result};
use crate::png::create_png_auto;
use crate::raster::RasterGrid;

const EARTH_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Default)]
pub struct MemoryEngine;

impl MemoryEngine {
    pub fn new() -> Self {
        Self
    }

    async fn load(raster: &Path) -> Result<RasterGrid> {
        let data = fs::read(raster).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Render `tile` by nearest-cell lookup at every pixel center.
pub fn render_tile(grid: &RasterGrid, tile: &TileCoord) -> Result<Vec<u8>> {
    let size = TILE_SIZE as usize;
    let bounds = tile.mercator_bounds();
    let res = (bounds.max_x - bounds.min_x) / size as f64;

    let mut pixels = vec![0u8; size * size * 4];
    pixels.par_chunks_mut(size * 4).enumerate().for_each(|(row, line)| {
        let y = bounds.max_y - (row as f64 + 0.5) * res;
        let lat = (y / EARTH_RADIUS).sinh().atan().to_degrees();
        for col in 0..size {
            let x = bounds.min_x + (col as f64 + 0.5) * res;
            let lon = x / ORIGIN_SHIFT * 180.0;
            let color = grid.color_at(lat, lon);
            line[col * 4..col * 4 + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    });

    create_png_auto(&pixels, size, size)
}

#[derive(Deserialize)]
struct PointCollection {
    features: Vec<serde_json::Value>,
}

fn feature_lonlat(feature: &serde_json::Value) -> Option<(f64, f64)> {
    let coords = feature.get("geometry")?.get("coordinates")?;
    Some((coords.get(0)?.as_f64()?, coords.get(1)?.as_f64()?))
}

#[async_trait]
impl RenderEngine for MemoryEngine {
    async fn build_raster(
        &self,
        grid: &RasterGrid,
        work_dir: &Path,
        artifact: &ProcessedArtifact,
    ) -> Result<PathBuf> {
        let path = artifact.path_in(work_dir);
        fs::write(&path, serde_json::to_vec(grid)?).await?;
        Ok(path)
    }

    async fn build_vector_tiles(&self, features: &Path, zooms: (u8, u8), out: &Path) -> Result<PathBuf> {
        let collection: PointCollection = serde_json::from_slice(&fs::read(features).await?)?;

        // Group features per tile, ordered for stable output.
        let mut tiles: BTreeMap<(u32, u32, u32), Vec<&serde_json::Value>> = BTreeMap::new();
        for feature in &collection.features {
            let Some((lon, lat)) = feature_lonlat(feature) else {
                continue;
            };
            for z in zooms.0..=zooms.1 {
                let t = latlon_to_tile(lat, lon, z as u32);
                tiles.entry((t.z, t.x, t.y)).or_default().push(feature);
            }
        }

        if out.exists() {
            fs::remove_file(out).await?;
        }
        let archive = MbTiles::create(out).await?;
        archive.set_metadata("format", "json").await?;
        archive.set_metadata("minzoom", &zooms.0.to_string()).await?;
        archive.set_metadata("maxzoom", &zooms.1.to_string()).await?;

        for ((z, x, y), members) in tiles {
            let payload = serde_json::to_vec(&serde_json::json!({
                "type": "FeatureCollection",
                "features": members,
            }))?;
            archive
                .put_tile(&TileCoord::new(z, x, y), &gzip(&payload)?)
                .await?;
        }
        archive.close().await;
        Ok(out.to_path_buf())
    }

    async fn warp_to_tile(&self, raster: &Path, tile: &TileCoord) -> Result<Bytes> {
        let grid = Self::load(raster).await?;
        let tile = *tile;
        let png = tokio::task::spawn_blocking(move || render_tile(&grid, &tile))
            .await
            .map_err(|e| RenderError::Encode(e.to_string()))??;
        Ok(Bytes::from(png))
    }

    async fn warp_to_value(&self, raster: &Path, tile: &TileCoord) -> Result<Option<f64>> {
        let grid = Self::load(raster).await?;
        let (lat, lon) = tile.center_latlon();
        Ok(grid.value_at(lat, lon))
    }
}
