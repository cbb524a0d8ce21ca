//! Error types for the ingestion crate.

use thiserror::Error;

/// Errors that can occur while decoding or deriving fields.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse GRIB2 data: {0}")]
    Grib2Parse(String),

    #[error("Failed to decode GRIB2 values: {0}")]
    Grib2Decode(String),

    #[error("No requested variable found in {0}")]
    NoMatchingVariables(String),

    #[error("Failed to serialize features: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
