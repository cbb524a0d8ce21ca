//! Synthetic point grids shaped like decoded model output.

use std::collections::HashMap;

use weather_common::GeoPoint;

/// Regular lat/lon grid over `(min_lon, min_lat, max_lon, max_lat)` with
/// `step` degree spacing; `f(lat, lon)` gives each value.
pub fn point_grid<F>(bbox: (f64, f64, f64, f64), step: f64, f: F) -> Vec<GeoPoint>
where
    F: Fn(f64, f64) -> f64,
{
    let (min_lon, min_lat, max_lon, max_lat) = bbox;
    let cols = ((max_lon - min_lon) / step).round() as usize + 1;
    let rows = ((max_lat - min_lat) / step).round() as usize + 1;

    let mut points = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            let lat = min_lat + row as f64 * step;
            let lon = min_lon + col as f64 * step;
            points.push(GeoPoint::new(lat, lon, f(lat, lon)));
        }
    }
    points
}

/// Constant-valued grid.
pub fn constant_grid(bbox: (f64, f64, f64, f64), step: f64, value: f64) -> Vec<GeoPoint> {
    point_grid(bbox, step, |_, _| value)
}

/// 2 m temperature in Kelvin, warming from north to south.
pub fn temperature_grid(bbox: (f64, f64, f64, f64), step: f64) -> Vec<GeoPoint> {
    let max_lat = bbox.3;
    point_grid(bbox, step, move |lat, _| 285.0 + (max_lat - lat) * 2.0)
}

/// Relative humidity in percent, rising eastwards.
pub fn humidity_grid(bbox: (f64, f64, f64, f64), step: f64) -> Vec<GeoPoint> {
    let min_lon = bbox.0;
    point_grid(bbox, step, move |_, lon| (40.0 + (lon - min_lon) * 20.0).min(100.0))
}

/// Every variable a package decode would return, one grid each.
///
/// Unknown variable names get a constant grid of 1.0.
pub fn package_samples(
    variables: &[&str],
    bbox: (f64, f64, f64, f64),
    step: f64,
) -> HashMap<String, Vec<GeoPoint>> {
    variables
        .iter()
        .map(|name| {
            let points = match *name {
                "2t" | "t2m" => temperature_grid(bbox, step),
                "2r" | "r2" => humidity_grid(bbox, step),
                "10u" | "u10" => constant_grid(bbox, step, 3.0),
                "10v" | "v10" => constant_grid(bbox, step, 4.0),
                "lcc" => constant_grid(bbox, step, 50.0),
                "mcc" => constant_grid(bbox, step, 20.0),
                "hcc" => constant_grid(bbox, step, 10.0),
                _ => constant_grid(bbox, step, 1.0),
            };
            (name.to_string(), points)
        })
        .collect()
}
