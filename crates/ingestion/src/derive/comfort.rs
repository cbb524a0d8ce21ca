use weather_common::GeoPoint;

use super::feels_like::valid_inputs;
use super::{joint_buckets, DerivedField, HUMIDITY_2M, TEMPERATURE_2M, WIND_U_10M, WIND_V_10M};
use crate::decoder::FieldSamples;

const NEUTRAL: f64 = 5.0;
const MIN_AT: f64 = -20.0;
const MAX_AT: f64 = 50.0;
const MIN_INDEX: f64 = 1.0;
const MAX_INDEX: f64 = 10.0;

/// Australian apparent temperature (°C) without radiation term.
fn steadman(t_c: f64, wind: f64, rh: f64) -> f64 {
    let vapour_pressure = rh / 100.0 * 6.105 * (17.27 * t_c / (237.7 + t_c)).exp();
    t_c + 0.33 * vapour_pressure - 0.70 * wind - 4.0
}

/// Apparent temperature in °C, or the air temperature when it cannot be computed.
pub fn apparent_temperature(t_kelvin: f64, u: f64, v: f64, rh: f64) -> f64 {
    let t_c = t_kelvin - 273.15;
    if !valid_inputs(t_kelvin, u, v, rh) {
        return t_c;
    }
    let at = steadman(t_c, u.hypot(v), rh);
    if at.is_finite() {
        at
    } else {
        t_c
    }
}

/// Comfort on a 1 (very cold) to 10 (very hot) scale.
///
/// Apparent temperatures from -20 °C to 50 °C map linearly onto the scale.
pub fn comfort_index(t_kelvin: f64, u: f64, v: f64, rh: f64) -> f64 {
    if !valid_inputs(t_kelvin, u, v, rh) {
        return NEUTRAL;
    }
    let at = steadman(t_kelvin - 273.15, u.hypot(v), rh);
    if !at.is_finite() {
        return NEUTRAL;
    }
    let index = MIN_INDEX + (at - MIN_AT) * (MAX_INDEX - MIN_INDEX) / (MAX_AT - MIN_AT);
    index.clamp(MIN_INDEX, MAX_INDEX)
}

fn derive_with(fields: &FieldSamples, f: fn(f64, f64, f64, f64) -> f64) -> DerivedField {
    joint_buckets(fields, &[TEMPERATURE_2M, WIND_U_10M, WIND_V_10M, HUMIDITY_2M], true)
        .into_iter()
        .filter_map(|(key, (lat, lon, values))| {
            let (t, u, v, r) = (values[0]?, values[1]?, values[2]?, values[3]?);
            Some((key, GeoPoint::new(lat, lon, f(t, u, v, r))))
        })
        .collect()
}

pub fn derive_comfort_index(fields: &FieldSamples) -> DerivedField {
    derive_with(fields, comfort_index)
}

pub fn derive_apparent_temperature(fields: &FieldSamples) -> DerivedField {
    derive_with(fields, apparent_temperature)
}
