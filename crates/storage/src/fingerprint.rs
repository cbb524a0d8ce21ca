//! Content fingerprints for cache keys and backing files.

use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::error::{Result, StorageError};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let hash = Sha256::digest(data.as_ref());
    format!("{hash:x}")
}

/// Fingerprint of a backing file: SHA-256 of its path and modification time.
///
/// Rewriting or touching the file changes the fingerprint.
pub fn backing_hash(path: &Path) -> Result<String> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(StorageError::at(path))?;
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(nanos.to_string().as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
