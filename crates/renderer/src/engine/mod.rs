//! Artifact builders and tile renderers.
//!
//! [`GdalEngine`] drives the GDAL command-line tools and `tippecanoe`;
//! [`MemoryEngine`] renders the same artifacts in-process for tests and
//! machines without those tools.

mod gdal;
mod memory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use weather_common::{ProcessedArtifact, TileCoord};

use crate::error::Result;
use crate::raster::RasterGrid;

pub use gdal::GdalEngine;
pub use memory::MemoryEngine;

/// Zoom range of generated vector tiles.
pub const VECTOR_ZOOMS: (u8, u8) = (0, 10);

#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Write the colorized raster of `artifact` into `work_dir`, returning
    /// the path of the published `_cog.tif` file.
    async fn build_raster(
        &self,
        grid: &RasterGrid,
        work_dir: &Path,
        artifact: &ProcessedArtifact,
    ) -> Result<PathBuf>;

    /// Turn a GeoJSON feature collection into an MBTiles archive at `out`.
    async fn build_vector_tiles(&self, features: &Path, zooms: (u8, u8), out: &Path) -> Result<PathBuf>;

    /// Render a 256x256 PNG of `tile` from a raster.
    async fn warp_to_tile(&self, raster: &Path, tile: &TileCoord) -> Result<Bytes>;

    /// Value band at the tile center, `None` where the raster has no data.
    async fn warp_to_value(&self, raster: &Path, tile: &TileCoord) -> Result<Option<f64>>;
}
