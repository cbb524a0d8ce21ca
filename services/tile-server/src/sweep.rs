//! Periodic removal of expired tile cache entries.

use std::sync::Arc;
use std::time::Duration;

use storage::TileCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sweep `cache` every `interval` until `cancel` fires.
pub async fn run_sweeper(cache: Arc<dyn TileCache>, interval: Duration, cancel: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Starting tile cache sweeper");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let removed = cache.sweep().await;
                let stats = cache.stats();
                debug!(removed, entries = stats.entries, "Swept tile cache");
            }
        }
    }
    info!("Tile cache sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use storage::MemoryTileCache;

    #[tokio::test]
    async fn test_sweeper_expires_entries_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("a_cog.tif");
        std::fs::write(&backing, b"cog").unwrap();

        let cache: Arc<dyn TileCache> = Arc::new(MemoryTileCache::new(Duration::from_millis(10)));
        cache.put("k", &backing, Bytes::from_static(b"png")).await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sweeper(cache.clone(), Duration::from_millis(20), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.stats().entries, 0);

        cancel.cancel();
        task.await.unwrap();
    }
}
