//! Common types and utilities shared across the weather tile services.

pub mod artifact;
pub mod bbox;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod run;
pub mod tile;

pub use artifact::{ArtifactFormat, ProcessedArtifact};
pub use bbox::BoundingBox;
pub use config::AppConfig;
pub use error::{WeatherError, WeatherResult};
pub use geo::{bucket_key, GeoPoint, Polygon};
pub use model::{FieldConfig, LayerConfig, ModelConfig, PackageConfig};
pub use tile::TileCoord;
