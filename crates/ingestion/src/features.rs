//! GeoJSON output for vector tile generation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use weather_common::geo::round2;

use crate::derive::DerivedField;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
pub struct Properties {
    pub value: f64,
}

impl FeatureCollection {
    /// One point feature per bucket, sorted by bucket key.
    pub fn from_field(field: &DerivedField) -> Self {
        let mut keys: Vec<&String> = field.keys().collect();
        keys.sort();

        let features = keys
            .into_iter()
            .map(|key| {
                let p = &field[key];
                Feature {
                    kind: "Feature",
                    geometry: Geometry {
                        kind: "Point",
                        coordinates: [p.lon, p.lat],
                    },
                    properties: Properties {
                        value: round2(p.value),
                    },
                }
            })
            .collect();

        Self {
            kind: "FeatureCollection",
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_common::GeoPoint;

    #[test]
    fn test_feature_collection_shape() {
        let mut field = DerivedField::new();
        field.insert("2.000,45.000".into(), GeoPoint::new(45.0, 2.0, 12.3456));

        let fc = FeatureCollection::from_field(&field);
        let json = serde_json::to_value(&fc).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], 2.0);
        assert_eq!(json["features"][0]["geometry"]["coordinates"][1], 45.0);
        assert_eq!(json["features"][0]["properties"]["value"], 12.35);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.geojson");
        let mut field = DerivedField::new();
        field.insert("0.000,39.000".into(), GeoPoint::new(39.0, 0.0, 1.0));

        FeatureCollection::from_field(&field).write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"FeatureCollection\""));
    }
}
