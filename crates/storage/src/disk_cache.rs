//! On-disk tile cache.
//!
//! Each entry is a pair of files named after the SHA-256 of the cache key:
//! `{hash}.tile` holds the bytes and `{hash}.hash` the backing-file
//! fingerprint. Age is measured from the `.tile` modification time, so
//! entries survive restarts and expire on the same TTL as in memory.
//!
//! Lookups share a read lock; stores and sweeps take the write lock and
//! replace files through a temp file and rename, so a reader never sees a
//! partially written tile.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::fingerprint::{backing_hash, sha256_hex};
use crate::tile_cache::{CacheStats, Counters, TileCache};

const TILE_EXT: &str = "tile";
const HASH_EXT: &str = "hash";
const TEMP_EXT: &str = "tmp";

pub struct DiskTileCache {
    dir: PathBuf,
    ttl: Duration,
    counters: Counters,
    entries: AtomicU64,
    lock: RwLock<()>,
}

impl DiskTileCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(StorageError::at(&dir))?;
        let existing = std::fs::read_dir(&dir)
            .map_err(StorageError::at(&dir))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == TILE_EXT))
            .count() as u64;
        Ok(Self {
            dir,
            ttl,
            counters: Counters::default(),
            entries: AtomicU64::new(existing),
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let name = sha256_hex(key);
        (
            self.dir.join(format!("{name}.{TILE_EXT}")),
            self.dir.join(format!("{name}.{HASH_EXT}")),
        )
    }

    fn is_fresh(&self, modified: SystemTime) -> bool {
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.ttl,
            // mtime in the future
            Err(_) => true,
        }
    }

    async fn lookup(&self, key: &str, backing: &Path) -> Option<Bytes> {
        let current = backing_hash(backing).ok()?;
        let (tile_path, hash_path) = self.entry_paths(key);
        let _guard = self.lock.read().await;

        let stored = fs::read_to_string(&hash_path).await.ok()?;
        if stored.trim() != current {
            return None;
        }
        let modified = fs::metadata(&tile_path).await.ok()?.modified().ok()?;
        if !self.is_fresh(modified) {
            return None;
        }
        fs::read(&tile_path).await.ok().map(Bytes::from)
    }

    /// Write an entry; returns whether the key was new.
    async fn store(&self, key: &str, backing: &Path, data: &[u8]) -> Result<bool> {
        let file_hash = backing_hash(backing)?;
        let (tile_path, hash_path) = self.entry_paths(key);
        let _guard = self.lock.write().await;

        let created = !fs::try_exists(&tile_path).await.unwrap_or(false);
        replace_file(&tile_path, data).await?;
        replace_file(&hash_path, file_hash.as_bytes()).await?;
        Ok(created)
    }

    async fn remove_expired(&self) -> Result<usize> {
        let _guard = self.lock.write().await;
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TEMP_EXT) {
                // left over from an interrupted store
                let _ = fs::remove_file(&path).await;
                continue;
            }
            if !path.extension().is_some_and(|ext| ext == TILE_EXT) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if self.is_fresh(modified) {
                continue;
            }
            fs::remove_file(&path).await?;
            let _ = fs::remove_file(path.with_extension(HASH_EXT)).await;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Write `data` next to `path` and rename it into place.
async fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{}.{TEMP_EXT}", Uuid::new_v4()));
    let temp = PathBuf::from(temp);

    fs::write(&temp, data).await.map_err(StorageError::at(&temp))?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(StorageError::IoAt {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

#[async_trait]
impl TileCache for DiskTileCache {
    async fn get(&self, key: &str, backing: &Path) -> Option<Bytes> {
        let found = self.lookup(key, backing).await;
        if found.is_some() {
            self.counters.hit();
        } else {
            self.counters.miss();
        }
        found
    }

    async fn put(&self, key: &str, backing: &Path, data: Bytes) {
        match self.store(key, backing, &data).await {
            Ok(true) => {
                self.entries.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to write tile to disk cache"),
        }
    }

    async fn sweep(&self) -> usize {
        let removed = match self.remove_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Disk cache sweep failed");
                0
            }
        };
        let _ = self
            .entries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(removed as u64))
            });
        if removed > 0 {
            debug!(removed, "Swept expired tiles from disk");
        }
        removed
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.load(Ordering::Relaxed))
    }
}
