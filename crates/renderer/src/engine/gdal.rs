//! Rendering through the GDAL command-line tools and `tippecanoe`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use weather_common::tile::TILE_SIZE;
use weather_common::{ProcessedArtifact, TileCoord};

use super::RenderEngine;
use crate::error::{RenderError, Result};
use crate::raster::{RasterGrid, BANDS, VALUE_NODATA};

const OVERVIEW_LEVELS: [&str; 4] = ["2", "4", "8", "16"];

/// Zoom above which tiles are resampled with nearest neighbour.
const NEAREST_ABOVE_ZOOM: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct GdalEngine;

impl GdalEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Run an external tool, mapping a missing binary and a non-zero exit to errors.
async fn run_tool<I, S>(tool: &'static str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    debug!(tool, ?args, "Running external tool");

    let output = Command::new(tool)
        .args(&args)
        .output()
        .await
        .map_err(|source| RenderError::ToolMissing { tool, source })?;

    if !output.status.success() {
        return Err(RenderError::ToolFailed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "Could not remove intermediate file");
    }
}

/// Parse `gdallocationinfo -valonly` output.
fn parse_location_value(stdout: &[u8]) -> Result<Option<f64>> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed.parse().map_err(|_| RenderError::MalformedOutput {
        tool: "gdallocationinfo",
        output: trimmed.to_string(),
    })?;
    if value == VALUE_NODATA as f64 {
        return Ok(None);
    }
    Ok(Some(value))
}

#[async_trait]
impl RenderEngine for GdalEngine {
    #[instrument(skip(self, grid), fields(artifact = %artifact.base_name()))]
    async fn build_raster(
        &self,
        grid: &RasterGrid,
        work_dir: &Path,
        artifact: &ProcessedArtifact,
    ) -> Result<PathBuf> {
        let base = artifact.base_name();

        // One single-band GeoTIFF per band.
        let mut band_files = Vec::with_capacity(BANDS.len());
        for band in BANDS {
            let asc = work_dir.join(format!("{}_{}.asc", base, band));
            let tif = work_dir.join(artifact.band_file(band));
            fs::write(&asc, grid.ascii_band(band)).await?;

            let data_type = if band == "value" { "Float32" } else { "Byte" };
            let result = run_tool(
                "gdal_translate",
                [
                    OsString::from("-of"),
                    "GTiff".into(),
                    "-co".into(),
                    "COMPRESS=LZW".into(),
                    "-a_srs".into(),
                    "EPSG:4326".into(),
                    "-ot".into(),
                    data_type.into(),
                    asc.clone().into(),
                    tif.clone().into(),
                ],
            )
            .await;
            remove_quietly(&asc).await;
            result?;
            band_files.push(tif);
        }

        // Stack the bands and flatten them into one tiled GeoTIFF.
        let vrt = work_dir.join(artifact.intermediate(".vrt"));
        let combined = work_dir.join(artifact.intermediate(".tif"));
        fs::write(&vrt, grid.vrt_document(&base)).await?;
        let result = run_tool(
            "gdal_translate",
            [
                OsString::from("-of"),
                "GTiff".into(),
                "-co".into(),
                "COMPRESS=LZW".into(),
                "-co".into(),
                "TILED=YES".into(),
                "-co".into(),
                "BLOCKXSIZE=64".into(),
                "-co".into(),
                "BLOCKYSIZE=64".into(),
                "-co".into(),
                "ALPHA=YES".into(),
                vrt.clone().into(),
                combined.clone().into(),
            ],
        )
        .await;
        remove_quietly(&vrt).await;
        for band in &band_files {
            remove_quietly(band).await;
        }
        result?;

        let cog = artifact.path_in(work_dir);
        let result = run_tool(
            "gdal_translate",
            [
                OsString::from("-of"),
                "GTiff".into(),
                "-co".into(),
                "TILED=YES".into(),
                "-co".into(),
                "BLOCKXSIZE=128".into(),
                "-co".into(),
                "BLOCKYSIZE=128".into(),
                "-co".into(),
                "COMPRESS=LZW".into(),
                "-co".into(),
                "COPY_SRC_OVERVIEWS=YES".into(),
                "-co".into(),
                "ALPHA=YES".into(),
                combined.clone().into(),
                cog.clone().into(),
            ],
        )
        .await;
        remove_quietly(&combined).await;
        result?;

        // Overviews only speed up low zooms; the COG is usable without them.
        let mut args = vec![OsString::from("-r"), "average".into(), cog.clone().into()];
        args.extend(OVERVIEW_LEVELS.iter().map(OsString::from));
        if let Err(e) = run_tool("gdaladdo", args).await {
            warn!(cog = %cog.display(), error = %e, "Failed to add overviews");
        }

        Ok(cog)
    }

    #[instrument(skip(self))]
    async fn build_vector_tiles(&self, features: &Path, zooms: (u8, u8), out: &Path) -> Result<PathBuf> {
        let layer = features
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "value".to_string());

        run_tool(
            "tippecanoe",
            [
                OsString::from("-o"),
                out.into(),
                "--force".into(),
                "--quiet".into(),
                "-Z".into(),
                zooms.0.to_string().into(),
                "-z".into(),
                zooms.1.to_string().into(),
                "-l".into(),
                layer.into(),
                features.into(),
            ],
        )
        .await?;
        Ok(out.to_path_buf())
    }

    async fn warp_to_tile(&self, raster: &Path, tile: &TileCoord) -> Result<Bytes> {
        let bounds = tile.mercator_bounds();
        let resampling = if tile.z > NEAREST_ABOVE_ZOOM { "near" } else { "cubic" };
        let size = TILE_SIZE.to_string();

        let output = run_tool(
            "gdalwarp",
            [
                OsString::from("-of"),
                "PNG".into(),
                "-dstalpha".into(),
                "-te".into(),
                format!("{:.10}", bounds.min_x).into(),
                format!("{:.10}", bounds.min_y).into(),
                format!("{:.10}", bounds.max_x).into(),
                format!("{:.10}", bounds.max_y).into(),
                "-te_srs".into(),
                "EPSG:3857".into(),
                "-t_srs".into(),
                "EPSG:3857".into(),
                "-ts".into(),
                size.clone().into(),
                size.into(),
                "-r".into(),
                resampling.into(),
                "-co".into(),
                "WORLDFILE=NO".into(),
                "-dstnodata".into(),
                "0".into(),
                "-q".into(),
                raster.into(),
                "/vsistdout/".into(),
            ],
        )
        .await?;

        if output.stdout.is_empty() {
            return Err(RenderError::MalformedOutput {
                tool: "gdalwarp",
                output: "empty image".to_string(),
            });
        }
        Ok(Bytes::from(output.stdout))
    }

    async fn warp_to_value(&self, raster: &Path, tile: &TileCoord) -> Result<Option<f64>> {
        let (lat, lon) = tile.center_latlon();
        let output = run_tool(
            "gdallocationinfo",
            [
                OsString::from("-valonly"),
                "-b".into(),
                (BANDS.len()).to_string().into(),
                "-wgs84".into(),
                raster.into(),
                lon.to_string().into(),
                lat.to_string().into(),
            ],
        )
        .await?;
        parse_location_value(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_value() {
        assert_eq!(parse_location_value(b"12.5\n").unwrap(), Some(12.5));
        assert_eq!(parse_location_value(b"\n").unwrap(), None);
        assert_eq!(parse_location_value(b"-9999\n").unwrap(), None);
        assert!(matches!(
            parse_location_value(b"garbage"),
            Err(RenderError::MalformedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_tool_is_typed_error() {
        let result = run_tool("weather-tiles-no-such-tool", ["--version"]).await;
        assert!(matches!(result, Err(RenderError::ToolMissing { .. })));
    }

    #[tokio::test]
    async fn test_failing_tool_reports_status() {
        let result = run_tool("sh", ["-c", "echo boom >&2; exit 3"]).await;
        match result {
            Err(RenderError::ToolFailed { tool, status, stderr }) => {
                assert_eq!(tool, "sh");
                assert_eq!(status.code(), Some(3));
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
