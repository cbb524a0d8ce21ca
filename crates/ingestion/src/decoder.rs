//! Decoding of package files into geographic samples.
//!
//! Decoding is CPU-bound and synchronous; async callers run it inside
//! `tokio::task::spawn_blocking`.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, warn};
use weather_common::GeoPoint;

use crate::error::{IngestionError, Result};
use crate::params::lookup_short_name;

/// Samples per source variable short name.
pub type FieldSamples = HashMap<String, Vec<GeoPoint>>;

/// Reads `(lat, lon, value)` samples for the requested variables.
pub trait GridDecoder: Send + Sync {
    fn decode(&self, path: &Path, variables: &[String]) -> Result<FieldSamples>;
}

/// Production decoder backed by the `grib` crate.
///
/// Walks every submessage of a (possibly multi-message) file and keeps
/// those whose short name matches a requested variable.
#[derive(Debug, Default, Clone)]
pub struct GribDecoder;

impl GribDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl GridDecoder for GribDecoder {
    fn decode(&self, path: &Path, variables: &[String]) -> Result<FieldSamples> {
        let file = File::open(path)?;
        let grib2 = grib::from_reader(BufReader::new(file))
            .map_err(|e| IngestionError::Grib2Parse(e.to_string()))?;

        let mut fields: FieldSamples = HashMap::new();

        for (index, submessage) in grib2.iter() {
            let discipline = submessage.indicator().discipline;
            let prod_def = submessage.prod_def();
            let (Some(category), Some(number)) =
                (prod_def.parameter_category(), prod_def.parameter_number())
            else {
                continue;
            };
            let surface = prod_def.fixed_surfaces().map(|(first, _)| {
                let value = first.scaled_value as f64 * 10f64.powi(-(first.scale_factor as i32));
                (first.surface_type, value)
            });

            let Some(short_name) = lookup_short_name(discipline, category, number, surface) else {
                continue;
            };
            if !variables.iter().any(|v| v == short_name) {
                continue;
            }

            let coords: Vec<(f32, f32)> = match submessage.latlons() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    warn!(message = ?index, variable = short_name, error = %e, "Unsupported grid, skipping message");
                    continue;
                }
            };

            let decoder = grib::Grib2SubmessageDecoder::from(submessage)
                .map_err(|e| IngestionError::Grib2Decode(e.to_string()))?;
            let values = decoder
                .dispatch()
                .map_err(|e| IngestionError::Grib2Decode(e.to_string()))?;

            let samples = fields.entry(short_name.to_string()).or_default();
            let before = samples.len();
            for ((lat, lon), value) in coords.into_iter().zip(values) {
                if !value.is_finite() {
                    continue;
                }
                samples.push(GeoPoint::new(lat as f64, normalize_lon(lon as f64), value as f64));
            }

            debug!(
                variable = short_name,
                samples = samples.len() - before,
                "Decoded GRIB2 message"
            );
        }

        if fields.is_empty() {
            return Err(IngestionError::NoMatchingVariables(
                path.display().to_string(),
            ));
        }

        Ok(fields)
    }
}

/// Bring longitudes from [0, 360) into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    if lon >= 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Decoder returning canned samples regardless of the file.
#[derive(Debug, Default, Clone)]
pub struct MemoryDecoder {
    fields: FieldSamples,
}

impl MemoryDecoder {
    pub fn new(fields: FieldSamples) -> Self {
        Self { fields }
    }

    /// Add samples for one variable.
    pub fn with_field(mut self, name: impl Into<String>, samples: Vec<GeoPoint>) -> Self {
        self.fields.insert(name.into(), samples);
        self
    }
}

impl GridDecoder for MemoryDecoder {
    fn decode(&self, path: &Path, variables: &[String]) -> Result<FieldSamples> {
        let selected: FieldSamples = self
            .fields
            .iter()
            .filter(|(name, _)| variables.contains(name))
            .map(|(name, samples)| (name.clone(), samples.clone()))
            .collect();

        if selected.is_empty() {
            return Err(IngestionError::NoMatchingVariables(
                path.display().to_string(),
            ));
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon(359.5), -0.5);
        assert_eq!(normalize_lon(180.0), -180.0);
        assert_eq!(normalize_lon(12.0), 12.0);
        assert_eq!(normalize_lon(-8.0), -8.0);
    }

    #[test]
    fn test_memory_decoder_selects_variables() {
        let decoder = MemoryDecoder::default()
            .with_field("2t", vec![GeoPoint::new(39.0, 0.0, 290.0)])
            .with_field("2r", vec![GeoPoint::new(39.0, 0.0, 60.0)]);

        let fields = decoder
            .decode(&PathBuf::from("file.grib2"), &["2t".to_string()])
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("2t"));

        let err = decoder.decode(&PathBuf::from("file.grib2"), &["lcc".to_string()]);
        assert!(matches!(err, Err(IngestionError::NoMatchingVariables(_))));
    }

    #[test]
    fn test_grib_decoder_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.grib2");
        std::fs::write(&path, b"definitely not GRIB").unwrap();

        let result = GribDecoder::new().decode(&path, &["2t".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_grib_decoder_missing_file() {
        let result = GribDecoder::new().decode(Path::new("/nonexistent/file.grib2"), &[]);
        assert!(matches!(result, Err(IngestionError::FileRead(_))));
    }
}
