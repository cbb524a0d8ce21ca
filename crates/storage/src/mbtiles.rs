//! MBTiles archives (SQLite) holding gzip'd vector tiles.
//!
//! Tiles are addressed in XYZ on the API and stored in TMS rows, as the
//! MBTiles 1.3 layout requires.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;
use weather_common::TileCoord;

use crate::error::{Result, StorageError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (name TEXT PRIMARY KEY, value TEXT);
CREATE TABLE IF NOT EXISTS tiles (
    zoom_level INTEGER NOT NULL,
    tile_column INTEGER NOT NULL,
    tile_row INTEGER NOT NULL,
    tile_data BLOB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (zoom_level, tile_column, tile_row)
"#;

pub struct MbTiles {
    pool: SqlitePool,
}

impl MbTiles {
    /// Create (or reopen for writing) an archive at `path`.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::at(parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        for statement in SCHEMA.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&pool).await?;
            }
        }

        debug!(path = %path.display(), "Created MBTiles archive");
        Ok(Self { pool })
    }

    /// Open an existing archive read-only.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn set_metadata(&self, name: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (name, value) VALUES (?, ?)")
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn metadata(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT name, value FROM metadata")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Store an already-encoded tile at XYZ `tile`.
    pub async fn put_tile(&self, tile: &TileCoord, data: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)",
        )
        .bind(tile.z as i64)
        .bind(tile.x as i64)
        .bind(tile.tms_y() as i64)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Tile bytes at XYZ `tile`, as stored.
    pub async fn tile(&self, tile: &TileCoord) -> Result<Option<Bytes>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
        )
        .bind(tile.z as i64)
        .bind(tile.x as i64)
        .bind(tile.tms_y() as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(data,)| Bytes::from(data)))
    }

    pub async fn tile_count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Gzip a tile payload the way vector tile archives store them.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
