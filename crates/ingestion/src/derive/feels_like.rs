use weather_common::GeoPoint;

use super::{joint_buckets, DerivedField, HUMIDITY_2M, TEMPERATURE_2M, WIND_U_10M, WIND_V_10M};
use crate::decoder::FieldSamples;

const ABSOLUTE_ZERO: f64 = 273.15;

/// Inputs outside these ranges are treated as corrupt.
pub(crate) fn valid_inputs(t_kelvin: f64, u: f64, v: f64, rh: f64) -> bool {
    (200.0..=350.0).contains(&t_kelvin)
        && (0.0..=100.0).contains(&rh)
        && u.abs() <= 100.0
        && v.abs() <= 100.0
}

fn wind_chill(t_c: f64, wind_ms: f64) -> f64 {
    let k = (wind_ms * 3.6).powf(0.16);
    13.12 + 0.6215 * t_c - 11.37 * k + 0.3965 * t_c * k
}

fn heat_index(t_c: f64, rh: f64) -> f64 {
    let (t, r) = (t_c, rh);
    -8.7847 + 1.6114 * t + 2.3385 * r - 0.1461 * t * r - 0.0123 * t * t - 0.0164 * r * r
        + 0.0022 * t * t * r
        + 0.0007 * t * r * r
        - 0.0003 * t * t * r * r
}

/// Perceived temperature in °C.
///
/// Wind chill below 10 °C with wind, heat index from 27 °C in humid air,
/// the air temperature otherwise. Falls back to the air temperature for
/// out-of-range inputs or results.
pub fn feels_like(t_kelvin: f64, u: f64, v: f64, rh: f64) -> f64 {
    let t_c = t_kelvin - ABSOLUTE_ZERO;
    if !valid_inputs(t_kelvin, u, v, rh) {
        return t_c;
    }

    let wind = u.hypot(v);
    let result = if t_c < 10.0 && wind > 1.3 {
        wind_chill(t_c, wind)
    } else if t_c >= 27.0 && rh >= 40.0 {
        heat_index(t_c, rh)
    } else {
        t_c
    };

    if !result.is_finite() || !(-100.0..=100.0).contains(&result) {
        return t_c;
    }
    result
}

pub fn derive_feels_like(fields: &FieldSamples) -> DerivedField {
    joint_buckets(fields, &[TEMPERATURE_2M, WIND_U_10M, WIND_V_10M, HUMIDITY_2M], true)
        .into_iter()
        .filter_map(|(key, (lat, lon, values))| {
            let (t, u, v, r) = (values[0]?, values[1]?, values[2]?, values[3]?);
            Some((key, GeoPoint::new(lat, lon, feels_like(t, u, v, r))))
        })
        .collect()
}
