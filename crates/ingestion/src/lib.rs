//! Weather field ingestion.
//!
//! Turns a downloaded GRIB2 package file into per-layer maps of bucketed
//! samples:
//!
//! - [`decoder`] reads `(lat, lon, value)` samples per source variable
//! - [`derive`] reduces those samples into one value per coordinate bucket
//! - [`params`] maps GRIB2 product codes to the short names used in config
//! - [`features`] converts derived samples into a GeoJSON feature collection

pub mod decoder;
pub mod derive;
pub mod error;
pub mod features;
pub mod params;

// Re-exports
pub use decoder::{GribDecoder, GridDecoder, MemoryDecoder};
pub use derive::{derive_layer, Derivation, DerivedField};
pub use error::{IngestionError, Result};
pub use params::{lookup_short_name, ParameterSpec};
