//! Colorization and rendering of derived weather fields.
//!
//! - [`color`] parses and formats palette colors
//! - [`palette`] maps values to colors and colors back to values
//! - [`raster`] turns bucketed samples into RGBA + value bands
//! - [`png`] encodes RGBA pixels
//! - [`engine`] builds artifacts and renders tiles from them

pub mod color;
pub mod engine;
pub mod error;
pub mod palette;
pub mod png;
pub mod raster;

pub use color::Rgba;
pub use engine::{GdalEngine, MemoryEngine, RenderEngine};
pub use error::{RenderError, Result};
pub use palette::{Palette, PaletteRegistry};
pub use raster::RasterGrid;
