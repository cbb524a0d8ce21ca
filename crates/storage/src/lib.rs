//! Storage for published weather artifacts.
//!
//! - [`layout`] storage/tmp/staging directories, markers and promotion
//! - [`gate`] all-or-nothing promotion of received runs
//! - [`tile_cache`] and [`disk_cache`] rendered tile caches
//! - [`mbtiles`] vector tile archives

pub mod disk_cache;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod layout;
pub mod mbtiles;
pub mod tile_cache;

pub use disk_cache::DiskTileCache;
pub use error::{Result, StorageError};
pub use gate::{CompletenessGate, GateOutcome};
pub use layout::{move_file, StorageLayout};
pub use mbtiles::MbTiles;
pub use tile_cache::{tile_cache_key, CacheStats, MemoryTileCache, TileCache};
