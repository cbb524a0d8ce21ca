use super::{bucket_means, DerivedField};
use crate::decoder::FieldSamples;

/// Coldest plausible surface temperature, colder results are decoding noise.
const MIN_CELSIUS: f64 = -70.0;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

/// Kelvin to Celsius, dropping implausibly cold results.
pub fn derive_temperature(fields: &FieldSamples) -> DerivedField {
    let mut derived = bucket_means(fields.values().flatten(), |_| true);
    derived.retain(|_, p| {
        p.value = kelvin_to_celsius(p.value);
        p.value >= MIN_CELSIUS
    });
    derived
}
