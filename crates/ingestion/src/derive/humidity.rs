use super::{bucket_means, DerivedField};
use crate::decoder::FieldSamples;

/// Relative humidity as published; exact zeros are missing data.
pub fn derive_humidity(fields: &FieldSamples) -> DerivedField {
    bucket_means(fields.values().flatten(), |v| v != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_common::GeoPoint;

    #[test]
    fn test_skips_zero_and_sentinel() {
        let mut fields = FieldSamples::new();
        fields.insert(
            "2r".into(),
            vec![
                GeoPoint::new(39.0, 0.0, 65.0),
                GeoPoint::new(39.1, 0.0, 0.0),
                GeoPoint::new(39.2, 0.0, 9999.0),
            ],
        );
        let derived = derive_humidity(&fields);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived["0.000,39.000"].value, 65.0);
    }
}
