//! Rendered tile caches.
//!
//! Entries are keyed by `{artifact_path}:{z}:{x}:{y}` and remember the
//! fingerprint of the artifact they were rendered from. A lookup is a hit
//! only while that fingerprint still matches and the entry is younger than
//! the TTL, so a tile rendered from a replaced artifact is never served.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;
use weather_common::TileCoord;

use crate::fingerprint::backing_hash;

/// Cache key for a tile rendered from `artifact`.
pub fn tile_cache_key(artifact: &Path, tile: &TileCoord) -> String {
    format!("{}:{}", artifact.display(), tile.cache_key())
}

/// A cache of rendered tiles invalidated by their backing file.
#[async_trait]
pub trait TileCache: Send + Sync {
    /// Cached bytes, if present, fresh and rendered from the current `backing` file.
    async fn get(&self, key: &str, backing: &Path) -> Option<Bytes>;

    /// Store bytes rendered from `backing`.
    async fn put(&self, key: &str, backing: &Path, data: Bytes);

    /// Drop expired entries, returning how many were removed.
    async fn sweep(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

/// Point-in-time counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

struct CachedTile {
    data: Bytes,
    file_hash: String,
    created_at: Instant,
}

/// In-process tile cache behind a single `RwLock`.
pub struct MemoryTileCache {
    tiles: RwLock<HashMap<String, CachedTile>>,
    ttl: Duration,
    counters: Counters,
    entries: AtomicU64,
}

impl MemoryTileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tiles: RwLock::new(HashMap::new()),
            ttl,
            counters: Counters::default(),
            entries: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn len(&self) -> usize {
        self.tiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tiles.read().await.is_empty()
    }
}

#[async_trait]
impl TileCache for MemoryTileCache {
    async fn get(&self, key: &str, backing: &Path) -> Option<Bytes> {
        // A missing backing file is a miss.
        let current = match backing_hash(backing) {
            Ok(hash) => hash,
            Err(_) => {
                self.counters.miss();
                return None;
            }
        };

        let tiles = self.tiles.read().await;
        match tiles.get(key) {
            Some(tile) if tile.file_hash == current && tile.created_at.elapsed() < self.ttl => {
                self.counters.hit();
                Some(tile.data.clone())
            }
            _ => {
                self.counters.miss();
                None
            }
        }
    }

    async fn put(&self, key: &str, backing: &Path, data: Bytes) {
        let Ok(file_hash) = backing_hash(backing) else {
            return;
        };

        let mut tiles = self.tiles.write().await;
        tiles.insert(
            key.to_string(),
            CachedTile {
                data,
                file_hash,
                created_at: Instant::now(),
            },
        );
        self.entries.store(tiles.len() as u64, Ordering::Relaxed);
    }

    async fn sweep(&self) -> usize {
        let mut tiles = self.tiles.write().await;
        let before = tiles.len();
        tiles.retain(|_, tile| tile.created_at.elapsed() <= self.ttl);
        let removed = before - tiles.len();
        self.entries.store(tiles.len() as u64, Ordering::Relaxed);

        if removed > 0 {
            debug!(removed, remaining = tiles.len(), "Swept expired tiles");
        }
        removed
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.load(Ordering::Relaxed))
    }
}
