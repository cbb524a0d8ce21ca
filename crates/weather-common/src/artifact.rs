//! Naming of processed artifacts and run markers.
//!
//! Every file the pipeline produces is named `{model}_{run}_{layer}_{hour}`
//! plus a format suffix, so the published run and the hour can be
//! recovered from the file name alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::WeatherError;

/// Output format of a processed layer/hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Colorized cloud-optimized GeoTIFF, warped into PNG tiles on read.
    Raster,
    /// Vector tile archive served as gzip'd protobuf tiles.
    Vector,
}

impl ArtifactFormat {
    /// Suffix appended to the base name.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactFormat::Raster => "_cog.tif",
            ArtifactFormat::Vector => ".mbtiles",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raster" | "cog" => Ok(ArtifactFormat::Raster),
            "vector" | "mbtiles" | "pbf" => Ok(ArtifactFormat::Vector),
            other => Err(WeatherError::InvalidParameter {
                param: "format".to_string(),
                message: format!("unknown artifact format '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Raster => write!(f, "raster"),
            ArtifactFormat::Vector => write!(f, "vector"),
        }
    }
}

/// A single published unit: one layer for one forecast hour of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessedArtifact {
    pub model: String,
    pub run: String,
    pub layer: String,
    pub hour: String,
    pub format: ArtifactFormat,
}

impl ProcessedArtifact {
    pub fn new(
        model: impl Into<String>,
        run: impl Into<String>,
        layer: impl Into<String>,
        hour: impl Into<String>,
        format: ArtifactFormat,
    ) -> Self {
        Self {
            model: model.into(),
            run: run.into(),
            layer: layer.into(),
            hour: hour.into(),
            format,
        }
    }

    /// `{model}_{run}_{layer}_{hour}`
    pub fn base_name(&self) -> String {
        format!("{}_{}_{}_{}", self.model, self.run, self.layer, self.hour)
    }

    /// Name of the published file.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.base_name(), self.format.suffix())
    }

    /// Name of an intermediate file, e.g. `intermediate(".geojson")`.
    pub fn intermediate(&self, suffix: &str) -> String {
        format!("{}{}", self.base_name(), suffix)
    }

    /// Name of a single raster band file, e.g. `{base}_r.tif`.
    pub fn band_file(&self, band: &str) -> String {
        format!("{}_{}.tif", self.base_name(), band)
    }

    /// Full path of the published file inside `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Recover an artifact from a published file name.
    ///
    /// Run identifiers contain no underscores, so the name splits cleanly
    /// into model, run, layer (which may contain underscores) and hour.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, format) = if let Some(stem) = file_name.strip_suffix(ArtifactFormat::Raster.suffix()) {
            (stem, ArtifactFormat::Raster)
        } else if let Some(stem) = file_name.strip_suffix(ArtifactFormat::Vector.suffix()) {
            (stem, ArtifactFormat::Vector)
        } else {
            return None;
        };

        let (model, rest) = stem.split_once('_')?;
        let (run, rest) = rest.split_once('_')?;
        let (layer, hour) = rest.rsplit_once('_')?;

        if model.is_empty() || layer.is_empty() || !is_run_id(run) || !is_hour(hour) {
            return None;
        }

        Some(Self::new(model, run, layer, hour, format))
    }
}

/// Prefix shared by every artifact of a run: `{model}_{run}_`.
pub fn run_prefix(model: &str, run: &str) -> String {
    format!("{}_{}_", model, run)
}

/// Name of the per-package completion marker.
pub fn marker_file_name(package: &str) -> String {
    format!("{}_current_run_datetime.txt", package)
}

/// Run identifiers look like `2024-03-10T12:00:00Z`.
pub fn is_run_id(s: &str) -> bool {
    crate::run::parse_run(s).is_some()
}

/// Forecast hours are two or more ASCII digits.
pub fn is_hour(s: &str) -> bool {
    s.len() >= 2 && s.chars().all(|c| c.is_ascii_digit())
}

/// Names safe to embed in a file name (no separators or traversal).
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Model names are safe components without `_`, the field separator of
/// artifact names.
pub fn is_model_name(s: &str) -> bool {
    is_safe_component(s) && !s.contains('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(format: ArtifactFormat) -> ProcessedArtifact {
        ProcessedArtifact::new("arome", "2024-03-10T12:00:00Z", "wind_speed", "07", format)
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            sample(ArtifactFormat::Raster).file_name(),
            "arome_2024-03-10T12:00:00Z_wind_speed_07_cog.tif"
        );
        assert_eq!(
            sample(ArtifactFormat::Vector).file_name(),
            "arome_2024-03-10T12:00:00Z_wind_speed_07.mbtiles"
        );
        assert_eq!(
            sample(ArtifactFormat::Raster).band_file("value"),
            "arome_2024-03-10T12:00:00Z_wind_speed_07_value.tif"
        );
    }

    #[test]
    fn test_parse_with_underscored_layer() {
        let raster = sample(ArtifactFormat::Raster);
        assert_eq!(ProcessedArtifact::parse(&raster.file_name()), Some(raster));

        let vector = sample(ArtifactFormat::Vector);
        assert_eq!(ProcessedArtifact::parse(&vector.file_name()), Some(vector));
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(ProcessedArtifact::parse("SP1_current_run_datetime.txt").is_none());
        assert!(ProcessedArtifact::parse("arome_notarun_temperature_01_cog.tif").is_none());
        assert!(ProcessedArtifact::parse("arome_2024-03-10T12:00:00Z_temperature_x_cog.tif").is_none());
        assert!(ProcessedArtifact::parse("file_SP1_2024-03-10T12:00:00Z_01.grib2").is_none());
    }

    #[test]
    fn test_safe_component() {
        assert!(is_safe_component("cloud_cover"));
        assert!(!is_safe_component("../etc"));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component(""));
    }

    #[test]
    fn test_model_name() {
        assert!(is_model_name("arome"));
        assert!(is_model_name("arome-hd"));
        assert!(!is_model_name("arome_x"));
        assert!(!is_model_name("../arome"));
        assert!(!is_model_name(""));

        // an underscored model could never be parsed back
        let artifact = ProcessedArtifact::new("arome_x", "2024-03-10T12:00:00Z", "humidity", "07", ArtifactFormat::Raster);
        assert_ne!(ProcessedArtifact::parse(&artifact.file_name()), Some(artifact));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("raster".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Raster);
        assert_eq!("MBTILES".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Vector);
        assert!("tiff".parse::<ArtifactFormat>().is_err());
    }
}
