use weather_common::GeoPoint;

use super::{bucket_means, find_field, joint_buckets, DerivedField, WIND_SPEED_10M, WIND_U_10M, WIND_V_10M};
use crate::decoder::FieldSamples;

/// Wind speed in m/s.
///
/// A published speed field is used as is; otherwise the speed is the
/// magnitude of the u/v components of the same bucket.
pub fn derive_wind_speed(fields: &FieldSamples) -> DerivedField {
    if let Some(speed) = find_field(fields, WIND_SPEED_10M) {
        return bucket_means(speed, |_| true);
    }

    joint_buckets(fields, &[WIND_U_10M, WIND_V_10M], true)
        .into_iter()
        .filter_map(|(key, (lat, lon, values))| {
            let (u, v) = (values[0]?, values[1]?);
            Some((key, GeoPoint::new(lat, lon, u.hypot(v))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_passthrough() {
        let mut fields = FieldSamples::new();
        fields.insert("10si".into(), vec![GeoPoint::new(39.0, 0.0, 7.5)]);
        fields.insert("10u".into(), vec![GeoPoint::new(39.0, 0.0, 100.0)]);
        let derived = derive_wind_speed(&fields);
        assert_eq!(derived["0.000,39.000"].value, 7.5);
    }

    #[test]
    fn test_from_components() {
        let mut fields = FieldSamples::new();
        fields.insert("10u".into(), vec![GeoPoint::new(39.0, 0.0, 3.0), GeoPoint::new(40.0, 0.0, 1.0)]);
        fields.insert("10v".into(), vec![GeoPoint::new(39.0, 0.0, 4.0)]);
        let derived = derive_wind_speed(&fields);
        assert_eq!(derived.len(), 1);
        assert!((derived["0.000,39.000"].value - 5.0).abs() < 1e-12);
    }
}
