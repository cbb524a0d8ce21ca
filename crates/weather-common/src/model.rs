//! Model configuration loaded from YAML.
//!
//! ```yaml
//! model: arome
//! packages:
//!   - name: SP1
//!     layers:
//!       - name: temperature
//!         fields:
//!           - { name: 2t, type: instant, unit: K, description: 2 metre temperature }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{WeatherError, WeatherResult};
use crate::geo::Polygon;

fn default_model_name() -> String {
    "arome".to_string()
}

/// Root of a model configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier used in artifact names
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Optional region as `[lat, lon]` vertices; points outside are dropped
    #[serde(default)]
    pub region: Option<Vec<[f64; 2]>>,

    pub packages: Vec<PackageConfig>,
}

/// An upstream package grouping several layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    pub layers: Vec<LayerConfig>,
}

/// A derived product and the source variables it consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// A source variable as named by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
}

impl ModelConfig {
    /// Load a model configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> WeatherResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WeatherError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a model configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> WeatherResult<Self> {
        let config: ModelConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> WeatherResult<()> {
        if self.packages.is_empty() {
            return Err(WeatherError::InvalidConfig(
                "model declares no packages".to_string(),
            ));
        }
        for package in &self.packages {
            if package.layers.is_empty() {
                return Err(WeatherError::InvalidConfig(format!(
                    "package {} declares no layers",
                    package.name
                )));
            }
        }
        Ok(())
    }

    /// Find a package by name.
    pub fn package(&self, name: &str) -> Option<&PackageConfig> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Every layer name across all packages.
    pub fn layer_names(&self) -> Vec<String> {
        self.packages
            .iter()
            .flat_map(|p| p.layers.iter().map(|l| l.name.clone()))
            .collect()
    }

    /// Find the package that produces a layer.
    pub fn package_for_layer(&self, layer: &str) -> Option<&PackageConfig> {
        self.packages
            .iter()
            .find(|p| p.layers.iter().any(|l| l.name == layer))
    }

    /// Region filter, if configured.
    pub fn region_polygon(&self) -> Option<Polygon> {
        self.region
            .as_ref()
            .map(|vertices| Polygon::new(vertices.iter().map(|v| (v[0], v[1])).collect()))
    }
}

impl PackageConfig {
    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.clone()).collect()
    }

    /// Distinct source variables needed by all layers of the package.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for field in self.layers.iter().flat_map(|l| l.fields.iter()) {
            if !names.contains(&field.name) {
                names.push(field.name.clone());
            }
        }
        names
    }
}

impl LayerConfig {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}
