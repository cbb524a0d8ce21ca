//! Per-layer derivation of bucketed values from decoded samples.
//!
//! Every derivation maps `variable -> samples` to `bucket -> sample`, where
//! the bucket is the coordinate rounded to 3 decimals. Several samples in
//! the same bucket are averaged, so the result does not depend on the
//! order of the input.

mod cloud_cover;
mod comfort;
mod feels_like;
mod humidity;
mod temperature;
mod wind;

use std::collections::HashMap;

use weather_common::geo::{is_sentinel, round3};
use weather_common::{bucket_key, GeoPoint};

use crate::decoder::FieldSamples;

pub use cloud_cover::{derive_cloud_cover, total_cloud_cover};
pub use comfort::{apparent_temperature, comfort_index, derive_apparent_temperature, derive_comfort_index};
pub use feels_like::{derive_feels_like, feels_like};
pub use humidity::derive_humidity;
pub use temperature::{derive_temperature, kelvin_to_celsius};
pub use wind::derive_wind_speed;

/// Derived values keyed by bucket.
pub type DerivedField = HashMap<String, GeoPoint>;

/// Aliases accepted for each physical input.
pub(crate) const TEMPERATURE_2M: &[&str] = &["2t", "t2m"];
pub(crate) const HUMIDITY_2M: &[&str] = &["2r", "r2"];
pub(crate) const WIND_U_10M: &[&str] = &["10u", "u10"];
pub(crate) const WIND_V_10M: &[&str] = &["10v", "v10"];
pub(crate) const WIND_SPEED_10M: &[&str] = &["10si", "ws", "si10"];

/// How a layer turns its inputs into values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Temperature,
    Humidity,
    WindSpeed,
    CloudCover,
    FeelsLike,
    ComfortIndex,
    ApparentTemperature,
    /// Bucket mean of whatever the layer consumes
    Passthrough,
}

impl Derivation {
    /// Pick the derivation for a layer name; unknown layers pass through.
    pub fn for_layer(layer: &str) -> Self {
        match layer {
            "temperature" => Derivation::Temperature,
            "humidity" => Derivation::Humidity,
            "wind_speed" => Derivation::WindSpeed,
            "cloud_cover" => Derivation::CloudCover,
            "feels_like" => Derivation::FeelsLike,
            "comfort_index" => Derivation::ComfortIndex,
            "apparent_temperature" => Derivation::ApparentTemperature,
            _ => Derivation::Passthrough,
        }
    }

    pub fn apply(&self, fields: &FieldSamples) -> DerivedField {
        match self {
            Derivation::Temperature => derive_temperature(fields),
            Derivation::Humidity => derive_humidity(fields),
            Derivation::WindSpeed => derive_wind_speed(fields),
            Derivation::CloudCover => derive_cloud_cover(fields),
            Derivation::FeelsLike => derive_feels_like(fields),
            Derivation::ComfortIndex => derive_comfort_index(fields),
            Derivation::ApparentTemperature => derive_apparent_temperature(fields),
            Derivation::Passthrough => derive_passthrough(fields),
        }
    }
}

/// Derive a layer by name.
pub fn derive_layer(layer: &str, fields: &FieldSamples) -> DerivedField {
    Derivation::for_layer(layer).apply(fields)
}

fn derive_passthrough(fields: &FieldSamples) -> DerivedField {
    bucket_means(fields.values().flatten(), |_| true)
}

#[derive(Default)]
struct Accumulator {
    lat: f64,
    lon: f64,
    values: Vec<f64>,
}

impl Accumulator {
    /// Mean summed in sorted order, so it is bit-identical for any input order.
    fn mean(mut self) -> f64 {
        self.values.sort_by(f64::total_cmp);
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// Average the non-sentinel samples accepted by `keep` per bucket.
pub(crate) fn bucket_means<'a, I, F>(points: I, keep: F) -> DerivedField
where
    I: IntoIterator<Item = &'a GeoPoint>,
    F: Fn(f64) -> bool,
{
    let mut buckets: HashMap<String, Accumulator> = HashMap::new();
    for p in points {
        if is_sentinel(p.value) || !keep(p.value) {
            continue;
        }
        let acc = buckets.entry(bucket_key(p.lat, p.lon)).or_default();
        acc.lat = round3(p.lat);
        acc.lon = round3(p.lon);
        acc.values.push(p.value);
    }

    buckets
        .into_iter()
        .map(|(key, acc)| {
            let (lat, lon) = (acc.lat, acc.lon);
            (key, GeoPoint::new(lat, lon, acc.mean()))
        })
        .collect()
}

/// Samples of the first alias present in `fields`.
pub(crate) fn find_field<'a>(fields: &'a FieldSamples, aliases: &[&str]) -> Option<&'a [GeoPoint]> {
    aliases
        .iter()
        .find_map(|name| fields.get(*name))
        .map(|v| v.as_slice())
}

/// Per-bucket means of several inputs, keeping buckets where `required`
/// inputs are all present. Missing optional inputs are `None`.
pub(crate) fn joint_buckets(
    fields: &FieldSamples,
    inputs: &[&[&str]],
    required: bool,
) -> HashMap<String, (f64, f64, Vec<Option<f64>>)> {
    let per_input: Vec<DerivedField> = inputs
        .iter()
        .map(|aliases| match find_field(fields, aliases) {
            Some(points) => bucket_means(points, |_| true),
            None => DerivedField::new(),
        })
        .collect();

    let mut joined: HashMap<String, (f64, f64, Vec<Option<f64>>)> = HashMap::new();
    for (i, field) in per_input.iter().enumerate() {
        for (key, point) in field {
            let entry = joined
                .entry(key.clone())
                .or_insert_with(|| (point.lat, point.lon, vec![None; inputs.len()]));
            entry.2[i] = Some(point.value);
        }
    }

    if required {
        joined.retain(|_, (_, _, values)| values.iter().all(Option::is_some));
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_layer() {
        assert_eq!(Derivation::for_layer("temperature"), Derivation::Temperature);
        assert_eq!(Derivation::for_layer("cloud_cover"), Derivation::CloudCover);
        assert_eq!(Derivation::for_layer("rainfall_accumulation"), Derivation::Passthrough);
    }

    #[test]
    fn test_bucket_means_average_and_skip_sentinels() {
        let points = vec![
            GeoPoint::new(39.0001, 0.0001, 10.0),
            GeoPoint::new(39.0002, 0.0002, 20.0),
            GeoPoint::new(39.0001, 0.0001, 9999.0),
            GeoPoint::new(40.0, 1.0, 5.0),
        ];
        let buckets = bucket_means(&points, |_| true);
        assert_eq!(buckets.len(), 2);
        let b = &buckets["0.000,39.000"];
        assert_eq!(b.value, 15.0);
        assert_eq!(b.lat, 39.0);
        assert_eq!(b.lon, 0.0);
    }

    #[test]
    fn test_passthrough_order_independent() {
        let mut points = vec![
            GeoPoint::new(39.0001, 0.0001, 1.0),
            GeoPoint::new(39.0002, 0.0002, 3.0),
        ];
        let mut fields = FieldSamples::new();
        fields.insert("tp".into(), points.clone());
        let a = derive_layer("rainfall_accumulation", &fields);
        points.reverse();
        fields.insert("tp".into(), points);
        let b = derive_layer("rainfall_accumulation", &fields);
        assert_eq!(a, b);
    }

    #[test]
    fn test_joint_buckets_required() {
        let mut fields = FieldSamples::new();
        fields.insert("2t".into(), vec![GeoPoint::new(39.0, 0.0, 290.0), GeoPoint::new(40.0, 0.0, 280.0)]);
        fields.insert("2r".into(), vec![GeoPoint::new(39.0, 0.0, 50.0)]);

        let joined = joint_buckets(&fields, &[TEMPERATURE_2M, HUMIDITY_2M], true);
        assert_eq!(joined.len(), 1);
        let optional = joint_buckets(&fields, &[TEMPERATURE_2M, HUMIDITY_2M], false);
        assert_eq!(optional.len(), 2);
        assert_eq!(optional["0.000,40.000"].2, vec![Some(280.0), None]);
    }
}
