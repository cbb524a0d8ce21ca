//! Rasterization of bucketed samples into colorized bands.
//!
//! The grid is north-up in EPSG:4326. Each sample lands in the cell at
//! `col = (lon - min_lon) / px`, `row = (max_lat - lat) / py`, and the
//! pixel size is the smallest spacing found between distinct coordinates.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use weather_common::GeoPoint;

use crate::color::Rgba;
use crate::error::{RenderError, Result};

const FALLBACK_CELL_SIZE: f64 = 0.01;

/// Absorbs float noise of regularly spaced coordinates when indexing cells.
const SNAP: f64 = 1e-6;

/// No-data marker of the color bands.
pub const COLOR_NODATA: f64 = -1.0;

/// No-data marker of the value band; far outside any physical value.
pub const VALUE_NODATA: f32 = -9999.0;

/// Band order of the combined raster.
pub const BANDS: [&str; 5] = ["r", "g", "b", "a", "value"];

/// Colors too transparent or too dark to draw are left empty.
pub fn is_drawable(color: &Rgba) -> bool {
    color.a >= 128 && color.luminance() >= 50.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub red: Vec<u8>,
    pub green: Vec<u8>,
    pub blue: Vec<u8>,
    pub alpha: Vec<u8>,
    pub values: Vec<f32>,
}

impl RasterGrid {
    /// Build the bands from samples, coloring each with `colorize`.
    pub fn from_points<'a, I, F>(points: I, colorize: F) -> Result<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
        F: Fn(f64) -> Rgba,
    {
        let points: Vec<&GeoPoint> = points.into_iter().collect();
        if points.is_empty() {
            return Err(RenderError::EmptyGrid);
        }

        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &points {
            min_lon = min_lon.min(p.lon);
            max_lon = max_lon.max(p.lon);
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
        }

        let pixel_width = smallest_gap(points.iter().map(|p| p.lon));
        let pixel_height = smallest_gap(points.iter().map(|p| p.lat));
        let width = ((max_lon - min_lon) / pixel_width - SNAP).ceil().max(0.0) as usize + 1;
        let height = ((max_lat - min_lat) / pixel_height - SNAP).ceil().max(0.0) as usize + 1;

        let cells = width * height;
        let mut grid = Self {
            width,
            height,
            min_lon,
            min_lat,
            max_lon,
            max_lat,
            pixel_width,
            pixel_height,
            red: vec![0; cells],
            green: vec![0; cells],
            blue: vec![0; cells],
            alpha: vec![0; cells],
            values: vec![VALUE_NODATA; cells],
        };

        for p in points {
            let color = colorize(p.value);
            if !is_drawable(&color) {
                continue;
            }
            let col = ((p.lon - min_lon) / pixel_width + SNAP) as usize;
            let row = ((max_lat - p.lat) / pixel_height + SNAP) as usize;
            if col < width && row < height {
                let i = row * width + col;
                grid.red[i] = color.r;
                grid.green[i] = color.g;
                grid.blue[i] = color.b;
                grid.alpha[i] = color.a;
                grid.values[i] = p.value as f32;
            }
        }

        Ok(grid)
    }

    /// Cell index covering a coordinate, if inside the grid.
    pub fn cell_at(&self, lat: f64, lon: f64) -> Option<usize> {
        let col = (lon - self.min_lon) / self.pixel_width + SNAP;
        let row = (self.max_lat - lat) / self.pixel_height + SNAP;
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.width && row < self.height).then(|| row * self.width + col)
    }

    /// Color of the cell covering a coordinate; transparent outside.
    pub fn color_at(&self, lat: f64, lon: f64) -> Rgba {
        match self.cell_at(lat, lon) {
            Some(i) => Rgba::new(self.red[i], self.green[i], self.blue[i], self.alpha[i]),
            None => Rgba::TRANSPARENT,
        }
    }

    /// Value band at a coordinate, `None` outside or on empty cells.
    pub fn value_at(&self, lat: f64, lon: f64) -> Option<f64> {
        let i = self.cell_at(lat, lon)?;
        let v = self.values[i];
        (v != VALUE_NODATA).then_some(v as f64)
    }

    pub fn filled_cells(&self) -> usize {
        self.alpha.iter().filter(|a| **a > 0).count()
    }

    /// ESRI ASCII grid of one band (see [`BANDS`]).
    pub fn ascii_band(&self, band: &str) -> String {
        let mut out = String::with_capacity(self.width * self.height * 4 + 128);
        let nodata = if band == "value" {
            VALUE_NODATA as f64
        } else {
            COLOR_NODATA
        };
        let _ = writeln!(out, "ncols         {}", self.width);
        let _ = writeln!(out, "nrows         {}", self.height);
        let _ = writeln!(out, "xllcorner     {:.6}", self.min_lon);
        let _ = writeln!(out, "yllcorner     {:.6}", self.min_lat);
        let _ = writeln!(out, "cellsize      {:.6}", self.pixel_width);
        let _ = writeln!(out, "NODATA_value  {}", nodata);

        for row in 0..self.height {
            let start = row * self.width;
            let cells = start..start + self.width;
            let line: Vec<String> = match band {
                "r" => cells.map(|i| self.red[i].to_string()).collect(),
                "g" => cells.map(|i| self.green[i].to_string()).collect(),
                "b" => cells.map(|i| self.blue[i].to_string()).collect(),
                "a" => cells.map(|i| self.alpha[i].to_string()).collect(),
                _ => cells.map(|i| format!("{:.3}", self.values[i])).collect(),
            };
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    pub fn write_ascii_band(&self, band: &str, path: &Path) -> Result<()> {
        fs::write(path, self.ascii_band(band))?;
        Ok(())
    }

    /// VRT stacking the five single-band GeoTIFFs named `{base}_{band}.tif`.
    pub fn vrt_document(&self, base_name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<VRTDataset rasterXSize="{}" rasterYSize="{}">"#,
            self.width, self.height
        );
        out.push_str("  <SRS>EPSG:4326</SRS>\n");
        let _ = writeln!(
            out,
            "  <GeoTransform>{:.6},{:.6},0.0,{:.6},0.0,{:.6}</GeoTransform>",
            self.min_lon, self.pixel_width, self.max_lat, -self.pixel_height
        );

        let interp = ["Red", "Green", "Blue", "Alpha"];
        for (n, band) in BANDS.iter().enumerate() {
            let data_type = if *band == "value" { "Float32" } else { "Byte" };
            let _ = writeln!(out, r#"  <VRTRasterBand dataType="{}" band="{}">"#, data_type, n + 1);
            match interp.get(n) {
                Some(name) => {
                    let _ = writeln!(out, "    <ColorInterp>{}</ColorInterp>", name);
                }
                None => out.push_str("    <Description>Value</Description>\n"),
            }
            out.push_str("    <SimpleSource>\n");
            let _ = writeln!(
                out,
                r#"      <SourceFilename relativeToVRT="1">{}_{}.tif</SourceFilename>"#,
                base_name, band
            );
            out.push_str("      <SourceBand>1</SourceBand>\n");
            let _ = writeln!(
                out,
                r#"      <SourceProperties RasterXSize="{w}" RasterYSize="{h}" DataType="{t}"/>"#,
                w = self.width,
                h = self.height,
                t = data_type
            );
            let _ = writeln!(
                out,
                r#"      <SrcRect xOff="0" yOff="0" xSize="{w}" ySize="{h}"/>"#,
                w = self.width,
                h = self.height
            );
            let _ = writeln!(
                out,
                r#"      <DstRect xOff="0" yOff="0" xSize="{w}" ySize="{h}"/>"#,
                w = self.width,
                h = self.height
            );
            out.push_str("    </SimpleSource>\n");
            out.push_str("  </VRTRasterBand>\n");
        }
        out.push_str("</VRTDataset>\n");
        out
    }
}

/// Smallest positive spacing between sorted distinct coordinates.
fn smallest_gap(coords: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = coords.collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();

    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|gap| *gap > 0.0)
        .min_by(f64::total_cmp)
        .unwrap_or(FALLBACK_CELL_SIZE)
}
