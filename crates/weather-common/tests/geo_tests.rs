//! Tests for bucketing, polygon filtering and tile math.

use weather_common::geo::{bucket_key, parse_bucket_key, round2, GeoPoint, Polygon};
use weather_common::tile::{latlon_to_tile, tile_to_latlon_bounds, tiles_in_bbox};
use weather_common::{BoundingBox, TileCoord};

// ============================================================================
// Bucketing
// ============================================================================

#[test]
fn test_nearby_points_share_a_bucket() {
    assert_eq!(bucket_key(39.46951, -0.37649), bucket_key(39.46949, -0.37651));
    assert_ne!(bucket_key(39.4695, -0.3765), bucket_key(39.4705, -0.3765));
}

#[test]
fn test_bucketing_is_idempotent_over_a_grid() {
    for i in 0..50 {
        let lat = 37.5 + i as f64 * 0.0137;
        let lon = -1.3 + i as f64 * 0.0291;
        let key = bucket_key(lat, lon);
        let (blat, blon) = parse_bucket_key(&key).unwrap();
        assert_eq!(bucket_key(blat, blon), key);
    }
}

#[test]
fn test_round2() {
    assert_eq!(round2(12.345), 12.35);
    assert_eq!(round2(-3.14159), -3.14);
    assert_eq!(round2(0.0), 0.0);
}

// ============================================================================
// Polygon
// ============================================================================

#[test]
fn test_triangle_contains() {
    let triangle = Polygon::new(vec![(0.0, 0.0), (10.0, 5.0), (0.0, 10.0)]);
    assert!(triangle.contains(2.0, 5.0));
    assert!(!triangle.contains(9.0, 1.0));
    assert!(!triangle.contains(-1.0, 5.0));
}

#[test]
fn test_default_region_filters_grid() {
    let region = Polygon::default_region();
    let mut points = Vec::new();
    for i in 0..20 {
        for j in 0..20 {
            points.push(GeoPoint::new(37.0 + i as f64 * 0.2, -2.0 + j as f64 * 0.2, 1.0));
        }
    }
    let kept = region.filter(points.clone());
    assert!(!kept.is_empty());
    assert!(kept.len() < points.len());
    assert!(kept
        .iter()
        .all(|p| p.lat > 37.8 && p.lat < 39.72 && p.lon > -1.25 && p.lon < 1.19));
}

// ============================================================================
// Tiles
// ============================================================================

#[test]
fn test_tile_bounds_contain_point() {
    for zoom in [3, 5, 6, 10] {
        let tile = latlon_to_tile(39.47, -0.38, zoom);
        let bounds = tile_to_latlon_bounds(&tile);
        assert!(bounds.contains_point(-0.38, 39.47), "zoom {}", zoom);
    }
}

#[test]
fn test_tiles_in_bbox_cover_corners() {
    let bbox = BoundingBox::new(-1.0, 38.0, 1.0, 40.0);
    let tiles = tiles_in_bbox(&bbox, 8);
    for (lat, lon) in [(38.0, -1.0), (40.0, 1.0), (39.0, 0.0)] {
        let t = latlon_to_tile(lat, lon, 8);
        assert!(tiles.contains(&t));
    }
}

#[test]
fn test_mercator_bounds_adjacent_tiles_touch() {
    let a = TileCoord::new(6, 31, 24).mercator_bounds();
    let b = TileCoord::new(6, 32, 24).mercator_bounds();
    assert!((a.max_x - b.min_x).abs() < 1e-6);
    let c = TileCoord::new(6, 31, 25).mercator_bounds();
    assert!((a.min_y - c.max_y).abs() < 1e-6);
}
