//! HTTP request handlers.
//!
//! - `tiles`: raster, vector and value tiles of the published run
//! - `metadata`: published run of a model
//! - `rollout`: ingestion of artifacts pushed by workers
//! - `health`: liveness, palettes and Prometheus metrics
//! - `error`: JSON error responses

pub mod error;
pub mod health;
pub mod metadata;
pub mod rollout;
pub mod tiles;

pub use error::ApiError;
pub use health::{metrics_handler, palettes_handler, up_handler};
pub use metadata::metadata_handler;
pub use rollout::rollout_handler;
pub use tiles::tile_handler;
