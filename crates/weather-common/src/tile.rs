//! XYZ tile coordinates and Web Mercator math.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::BoundingBox;

/// Half the Web Mercator extent in meters (pi * 6378137).
pub const ORIGIN_SHIFT: f64 = PI * 6_378_137.0;

/// Pixel size of a rendered tile.
pub const TILE_SIZE: u32 = 256;

/// A tile coordinate (z/x/y), XYZ scheme with top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Validated constructor: x and y must be within `2^z`.
    pub fn checked(z: u32, x: u32, y: u32) -> Option<Self> {
        if z > 30 {
            return None;
        }
        let n = 1u64 << z;
        if (x as u64) < n && (y as u64) < n {
            Some(Self { z, x, y })
        } else {
            None
        }
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.z, self.x, self.y)
    }

    /// Row in the TMS scheme (bottom-left origin) used by MBTiles.
    pub fn tms_y(&self) -> u32 {
        let n = 1u64 << self.z;
        (n - 1 - self.y as u64) as u32
    }

    /// Tile extent in EPSG:3857 meters.
    pub fn mercator_bounds(&self) -> BoundingBox {
        let res = 2.0 * ORIGIN_SHIFT / (1u64 << self.z) as f64 / TILE_SIZE as f64;
        let span = TILE_SIZE as f64 * res;

        let min_x = self.x as f64 * span - ORIGIN_SHIFT;
        let max_x = (self.x + 1) as f64 * span - ORIGIN_SHIFT;
        let max_y = ORIGIN_SHIFT - self.y as f64 * span;
        let min_y = ORIGIN_SHIFT - (self.y + 1) as f64 * span;

        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    /// Geographic center of the tile as (lat, lon).
    pub fn center_latlon(&self) -> (f64, f64) {
        let bounds = tile_to_latlon_bounds(self);
        let lon = (bounds.min_x + bounds.max_x) / 2.0;
        let (_, y) = self.mercator_bounds().center();
        let lat = (y / 6_378_137.0).sinh().atan().to_degrees();
        (lat, lon)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert lat/lon to Web Mercator tile coordinates.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = (1u64 << zoom) as f64;
    let max = (1u64 << zoom) - 1;

    let x = ((lon + 180.0) / 360.0 * n).floor().max(0.0) as u64;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor().max(0.0) as u64;

    TileCoord {
        z: zoom,
        x: x.min(max) as u32,
        y: y.min(max) as u32,
    }
}

/// Convert Web Mercator tile coordinates to lat/lon bounds (x = lon, y = lat).
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> BoundingBox {
    let n = (1u64 << coord.z) as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x + 1) as f64 / n * 360.0 - 180.0;

    let lat_max = (PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (PI * (1.0 - 2.0 * (coord.y + 1) as f64 / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// All tiles at `zoom` covering a geographic bbox (x = lon, y = lat).
pub fn tiles_in_bbox(bbox: &BoundingBox, zoom: u32) -> Vec<TileCoord> {
    let top_left = latlon_to_tile(bbox.max_y, bbox.min_x, zoom);
    let bottom_right = latlon_to_tile(bbox.min_y, bbox.max_x, zoom);

    let mut tiles = Vec::new();
    for x in top_left.x..=bottom_right.x {
        for y in top_left.y..=bottom_right.y {
            tiles.push(TileCoord::new(zoom, x, y));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom0_bounds() {
        let b = TileCoord::new(0, 0, 0).mercator_bounds();
        assert!((b.min_x + ORIGIN_SHIFT).abs() < 1e-6);
        assert!((b.max_x - ORIGIN_SHIFT).abs() < 1e-6);
        assert!((b.min_y + ORIGIN_SHIFT).abs() < 1e-6);
        assert!((b.max_y - ORIGIN_SHIFT).abs() < 1e-6);
    }

    #[test]
    fn test_zoom1_quadrants() {
        let b = TileCoord::new(1, 1, 0).mercator_bounds();
        assert!(b.min_x.abs() < 1e-6);
        assert!(b.min_y.abs() < 1e-6);
        assert!((b.max_x - ORIGIN_SHIFT).abs() < 1e-6);
    }

    #[test]
    fn test_tms_flip() {
        assert_eq!(TileCoord::new(3, 2, 0).tms_y(), 7);
        assert_eq!(TileCoord::new(3, 2, 7).tms_y(), 0);
        assert_eq!(TileCoord::new(0, 0, 0).tms_y(), 0);
    }

    #[test]
    fn test_checked() {
        assert!(TileCoord::checked(2, 3, 3).is_some());
        assert!(TileCoord::checked(2, 4, 0).is_none());
        assert!(TileCoord::checked(0, 0, 1).is_none());
    }

    #[test]
    fn test_latlon_roundtrip() {
        let tile = latlon_to_tile(39.47, -0.38, 6);
        let bounds = tile_to_latlon_bounds(&tile);
        assert!(bounds.contains_point(-0.38, 39.47));
        let (lat, lon) = tile.center_latlon();
        assert!(bounds.contains_point(lon, lat));
    }

    #[test]
    fn test_tiles_in_bbox() {
        let bbox = BoundingBox::new(-12.736815506536061, 37.33132975722407, 12.998159721174034, 55.94846979868936);
        let z5 = tiles_in_bbox(&bbox, 5);
        assert!(!z5.is_empty());
        assert!(z5.iter().all(|t| t.z == 5));
        let z6 = tiles_in_bbox(&bbox, 6);
        assert!(z6.len() > z5.len());
    }
}
