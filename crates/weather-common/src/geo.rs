//! Geographic samples, bucketing and polygon filtering.

use serde::{Deserialize, Serialize};

/// Values at or above this are "no data" markers emitted by the decoder.
pub const SENTINEL: f64 = 9999.0;

/// A decoded or derived sample at a geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, value: f64) -> Self {
        Self { lat, lon, value }
    }

    /// True when the value is a no-data marker (never treated as zero).
    pub fn is_sentinel(&self) -> bool {
        is_sentinel(self.value)
    }

    /// Bucket key of this point's coordinate.
    pub fn bucket(&self) -> String {
        bucket_key(self.lat, self.lon)
    }
}

/// True when `value` is a no-data marker or not a finite number.
pub fn is_sentinel(value: f64) -> bool {
    !value.is_finite() || value >= SENTINEL
}

/// Round to 3 decimals, the bucket resolution.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Round to 2 decimals, the resolution of published values.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Canonical bucket key `"lon,lat"` with both rounded to 3 decimals.
///
/// Applying it to the coordinates of a bucketed point yields the same key.
pub fn bucket_key(lat: f64, lon: f64) -> String {
    format!("{:.3},{:.3}", round3(lon), round3(lat))
}

/// Parse a bucket key back into `(lat, lon)`.
pub fn parse_bucket_key(key: &str) -> Option<(f64, f64)> {
    let (lon, lat) = key.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// Closed polygon given as `(lat, lon)` vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self { vertices }
    }

    /// Region around Valencia served by the public deployment.
    pub fn default_region() -> Self {
        Self::new(vec![
            (39.7153328, 1.1861908),
            (39.7097536, 0.3860986),
            (39.7049828, -1.2260914),
            (37.8525431, -1.2438369),
            (37.8358186, 1.1625552),
        ])
    }

    /// Ray-casting point-in-polygon test.
    ///
    /// Horizontal edges never count as crossings. Points on the upper
    /// boundary of an edge are inside, points on the lower boundary are not.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        let (x, y) = (lon, lat);
        let mut inside = false;
        let (mut p1y, mut p1x) = self.vertices[0];

        for i in 1..=n {
            let (p2y, p2x) = self.vertices[i % n];
            if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
                let x_intersect = if p1y != p2y {
                    (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x
                } else {
                    0.0
                };
                if p1x == p2x || x <= x_intersect {
                    inside = !inside;
                }
            }
            p1x = p2x;
            p1y = p2y;
        }

        inside
    }

    /// Keep only the points inside the polygon.
    pub fn filter(&self, points: Vec<GeoPoint>) -> Vec<GeoPoint> {
        points
            .into_iter()
            .filter(|p| self.contains(p.lat, p.lon))
            .collect()
    }
}
