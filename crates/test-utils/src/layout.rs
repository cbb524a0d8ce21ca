//! Temporary storage/tmp/staging directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway root with `storage/`, `tmp/` and `staging/` created.
///
/// Everything is removed when the value is dropped.
pub struct TempLayout {
    root: TempDir,
}

impl TempLayout {
    pub fn new() -> Self {
        let root = tempfile::Builder::new()
            .prefix("weather_tiles_")
            .tempdir()
            .expect("Failed to create temporary test directory");
        for dir in ["storage", "tmp", "staging"] {
            fs::create_dir_all(root.path().join(dir)).expect("Failed to create layout directory");
        }
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn storage(&self) -> PathBuf {
        self.root.path().join("storage")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    pub fn staging(&self) -> PathBuf {
        self.root.path().join("staging")
    }

    /// Write `contents` under the root and return the full path.
    pub fn write(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }

    /// File names directly under `dir`, sorted.
    pub fn list(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TempLayout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_dirs_exist() {
        let layout = TempLayout::new();
        assert!(layout.storage().is_dir());
        assert!(layout.tmp().is_dir());
        assert!(layout.staging().is_dir());
    }

    #[test]
    fn test_write_and_list() {
        let layout = TempLayout::new();
        layout.write("tmp/b.txt", b"b");
        layout.write("tmp/a.txt", b"a");
        assert_eq!(TempLayout::list(&layout.tmp()), vec!["a.txt", "b.txt"]);
    }
}
