use weather_common::GeoPoint;

use super::{joint_buckets, DerivedField};
use crate::decoder::FieldSamples;

const LOW: &[&str] = &["lcc"];
const MEDIUM: &[&str] = &["mcc"];
const HIGH: &[&str] = &["hcc"];

/// Fraction in [0, 1]; percentages are scaled down first.
fn as_fraction(value: f64) -> f64 {
    let value = if value > 1.0 { value / 100.0 } else { value };
    value.clamp(0.0, 1.0)
}

/// Total cloud cover in percent from low, medium and high layer cover.
///
/// Layers overlap randomly: each higher layer only adds cover over the sky
/// left clear by the layers below it.
pub fn total_cloud_cover(low: f64, medium: f64, high: f64) -> f64 {
    let (l, m, h) = (as_fraction(low), as_fraction(medium), as_fraction(high));
    let total = l + m * (1.0 - l) + h * (1.0 - l) * (1.0 - m);
    total.clamp(0.0, 1.0) * 100.0
}

/// A layer missing from a bucket counts as clear sky.
pub fn derive_cloud_cover(fields: &FieldSamples) -> DerivedField {
    joint_buckets(fields, &[LOW, MEDIUM, HIGH], false)
        .into_iter()
        .map(|(key, (lat, lon, values))| {
            let [l, m, h] = [0, 1, 2].map(|i| values[i].unwrap_or(0.0));
            (key, GeoPoint::new(lat, lon, total_cloud_cover(l, m, h)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_total_cloud_cover_reference_values() {
        let cases = [
            ((0.5, 0.2, 0.1), 64.0),
            ((0.0, 0.0, 0.0), 0.0),
            ((1.0, 0.5, 0.5), 100.0),
            ((1.0, 1.0, 1.0), 100.0),
            ((0.0, 0.5, 0.0), 50.0),
            ((0.0, 0.0, 0.8), 80.0),
            ((0.0, 0.5, 0.5), 75.0),
            ((1.1, 1.2, 1.3), 100.0),
            ((-0.1, -0.2, -0.3), 0.0),
        ];
        for ((l, m, h), expected) in cases {
            let got = total_cloud_cover(l, m, h);
            assert!(close(got, expected), "({l}, {m}, {h}) -> {got}, want {expected}");
        }
    }

    #[test]
    fn test_percent_inputs() {
        assert!(close(total_cloud_cover(50.0, 20.0, 10.0), 64.0));
    }

    #[test]
    fn test_missing_layer_counts_as_clear() {
        let mut fields = FieldSamples::new();
        fields.insert("mcc".into(), vec![GeoPoint::new(39.0, 0.0, 50.0)]);
        fields.insert("hcc".into(), vec![GeoPoint::new(39.0, 0.0, 9999.0)]);
        let derived = derive_cloud_cover(&fields);
        assert!(close(derived["0.000,39.000"].value, 50.0));
    }
}
