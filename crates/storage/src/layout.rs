//! Directory layout of published, in-flight and received artifacts.
//!
//! - `storage/` published artifacts and per-package run markers
//! - `tmp/` files the worker is still producing
//! - `staging/` uploads received by the server, awaiting promotion

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;
use weather_common::artifact::{marker_file_name, run_prefix};
use weather_common::{AppConfig, ArtifactFormat, ProcessedArtifact};

use crate::error::{Result, StorageError};

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    storage: PathBuf,
    tmp: PathBuf,
    staging: PathBuf,
}

impl StorageLayout {
    pub fn new(storage: impl Into<PathBuf>, tmp: impl Into<PathBuf>, staging: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
            tmp: tmp.into(),
            staging: staging.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.storage_dir, &config.tmp_dir, &config.staging_dir)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.storage, &self.tmp, &self.staging] {
            fs::create_dir_all(dir).await.map_err(StorageError::at(dir))?;
        }
        Ok(())
    }

    // === Markers ===

    /// Run recorded as published for `package`, if any.
    pub async fn published_marker(&self, package: &str) -> Option<String> {
        let path = self.storage.join(marker_file_name(package));
        fs::read_to_string(path).await.ok()
    }

    /// Whether `run` is already published for `package`.
    pub async fn is_up_to_date(&self, package: &str, run: &str) -> bool {
        self.published_marker(package).await.as_deref() == Some(run)
    }

    /// Record `run` as in flight; the marker is published with the artifacts.
    pub async fn write_pending_marker(&self, package: &str, run: &str) -> Result<()> {
        let path = self.tmp.join(marker_file_name(package));
        fs::write(&path, run).await.map_err(StorageError::at(&path))
    }

    /// Move the pending marker of `package` into `storage/`.
    pub async fn publish_marker(&self, package: &str) -> Result<()> {
        let name = marker_file_name(package);
        move_file(&self.tmp.join(&name), &self.storage.join(&name)).await
    }

    // === Local rollout ===

    /// Publish a finished package run from `tmp/` into `storage/`.
    ///
    /// Moves every artifact, then the marker, deletes the previous runs of
    /// the package's layers and clears the package's leftovers from `tmp/`.
    /// If any artifact cannot be moved the marker stays pending and `tmp/`
    /// is left as is.
    pub async fn promote_package(
        &self,
        package: &str,
        layers: &[String],
        artifacts: &[ProcessedArtifact],
    ) -> Result<()> {
        let mut current_run = None;
        let mut failed = 0;
        for artifact in artifacts {
            let name = artifact.file_name();
            if let Err(e) = move_file(&self.tmp.join(&name), &self.storage.join(&name)).await {
                warn!(file = %name, error = %e, "Failed to move artifact into storage");
                failed += 1;
            }
            current_run = Some((artifact.model.clone(), artifact.run.clone()));
        }

        if failed > 0 {
            return Err(StorageError::PromotionIncomplete {
                package: package.to_string(),
                failed,
                total: artifacts.len(),
            });
        }

        self.publish_marker(package).await?;

        if let Some((model, run)) = current_run {
            let removed = self.delete_previous_runs(&model, &run, Some(layers)).await?;
            debug!(package = %package, removed, "Deleted previous run artifacts");
        }

        let mut patterns: Vec<&str> = layers.iter().map(String::as_str).collect();
        patterns.push(package);
        self.cleanup_tmp(&patterns).await?;

        info!(package = %package, artifacts = artifacts.len(), "Rolled out locally");
        Ok(())
    }

    /// Remove `tmp/` files whose name contains any of `patterns`.
    ///
    /// An empty pattern list clears the whole directory.
    pub async fn cleanup_tmp(&self, patterns: &[&str]) -> Result<usize> {
        let mut removed = 0;
        for name in list_files(&self.tmp).await? {
            if !patterns.is_empty() && !patterns.iter().any(|p| name.contains(p)) {
                continue;
            }
            match fs::remove_file(self.tmp.join(&name)).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %name, error = %e, "Failed to remove tmp file"),
            }
        }
        Ok(removed)
    }

    /// Delete published artifacts of `model` from runs older than `keep_run`,
    /// optionally limited to `layers`.
    pub async fn delete_previous_runs(
        &self,
        model: &str,
        keep_run: &str,
        layers: Option<&[String]>,
    ) -> Result<usize> {
        let mut removed = 0;
        for name in list_files(&self.storage).await? {
            let Some(artifact) = ProcessedArtifact::parse(&name) else {
                continue;
            };
            if artifact.model != model || artifact.run.as_str() >= keep_run {
                continue;
            }
            if let Some(layers) = layers {
                if !layers.iter().any(|l| *l == artifact.layer) {
                    continue;
                }
            }
            fs::remove_file(self.storage.join(&name))
                .await
                .map_err(StorageError::at(self.storage.join(&name)))?;
            removed += 1;
        }
        Ok(removed)
    }

    // === Reads ===

    /// Greatest run id among the published artifacts of `model`.
    pub async fn latest_published_run(&self, model: &str) -> Result<Option<String>> {
        let latest = list_files(&self.storage)
            .await?
            .iter()
            .filter_map(|name| ProcessedArtifact::parse(name))
            .filter(|a| a.model == model)
            .map(|a| a.run)
            .max();
        Ok(latest)
    }

    /// Path of the newest published artifact for `layer`/`hour`.
    ///
    /// Packages publish independently, so each layer/hour resolves to its
    /// own latest run rather than the model-wide one.
    pub async fn published_artifact(
        &self,
        model: &str,
        layer: &str,
        hour: &str,
        format: ArtifactFormat,
    ) -> Result<Option<PathBuf>> {
        let newest = list_files(&self.storage)
            .await?
            .iter()
            .filter_map(|name| ProcessedArtifact::parse(name))
            .filter(|a| a.model == model && a.layer == layer && a.hour == hour && a.format == format)
            .max_by(|a, b| a.run.cmp(&b.run));
        Ok(newest.map(|a| a.path_in(&self.storage)))
    }

    /// All published artifacts of a run.
    pub async fn published_artifacts(&self, model: &str, run: &str) -> Result<Vec<ProcessedArtifact>> {
        let mut artifacts: Vec<ProcessedArtifact> = list_files(&self.storage)
            .await?
            .iter()
            .filter_map(|name| ProcessedArtifact::parse(name))
            .filter(|a| a.model == model && a.run == run)
            .collect();
        artifacts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(artifacts)
    }

    // === Staging ===

    /// Write an upload into `staging/` through a unique partial file.
    pub async fn stage(&self, artifact: &ProcessedArtifact, data: &[u8]) -> Result<PathBuf> {
        let final_path = self.staging.join(artifact.file_name());
        let partial = self.staging.join(format!(
            "{}.{}{}",
            artifact.file_name(),
            Uuid::new_v4(),
            PARTIAL_SUFFIX
        ));

        let mut file = fs::File::create(&partial).await.map_err(StorageError::at(&partial))?;
        file.write_all(data).await.map_err(StorageError::at(&partial))?;
        file.sync_all().await.map_err(StorageError::at(&partial))?;
        drop(file);

        if let Err(e) = fs::rename(&partial, &final_path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::IoAt {
                path: final_path,
                source: e,
            });
        }
        Ok(final_path)
    }

    /// Staged (complete) artifacts of a run.
    pub async fn staged_artifacts(&self, model: &str, run: &str) -> Result<Vec<String>> {
        let prefix = run_prefix(model, run);
        Ok(list_files(&self.staging)
            .await?
            .into_iter()
            .filter(|name| name.starts_with(&prefix) && !name.ends_with(PARTIAL_SUFFIX))
            .collect())
    }

    pub async fn staged_count(&self, model: &str, run: &str) -> Result<usize> {
        Ok(self.staged_artifacts(model, run).await?.len())
    }

    /// Move every staged artifact of a run into `storage/`.
    pub async fn promote_staged_run(&self, model: &str, run: &str) -> Result<Vec<String>> {
        let names = self.staged_artifacts(model, run).await?;
        for name in &names {
            move_file(&self.staging.join(name), &self.storage.join(name)).await?;
        }
        Ok(names)
    }

    /// Remove staged uploads of `model` left behind by runs older than
    /// `run`, and every unfinished partial file of those runs or of `run`.
    pub async fn clear_stale_staging(&self, model: &str, run: &str) -> Result<usize> {
        let mut removed = 0;
        for name in list_files(&self.staging).await? {
            let (artifact, partial) = match name.strip_suffix(PARTIAL_SUFFIX) {
                Some(stem) => (stem.rsplit_once('.').and_then(|(file, _)| ProcessedArtifact::parse(file)), true),
                None => (ProcessedArtifact::parse(&name), false),
            };
            let stale = match artifact {
                Some(a) if a.model == model => a.run.as_str() < run || (partial && a.run == run),
                Some(_) => false,
                None => partial,
            };
            if !stale {
                continue;
            }
            match fs::remove_file(self.staging.join(&name)).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %name, error = %e, "Failed to remove staged file"),
            }
        }
        Ok(removed)
    }
}

/// Move a file, falling back to copy + fsync + remove across filesystems.
pub async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }

    let mut reader = fs::File::open(src).await.map_err(StorageError::at(src))?;
    let mut writer = fs::File::create(dst).await.map_err(StorageError::at(dst))?;
    tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(StorageError::at(dst))?;
    writer.sync_all().await.map_err(StorageError::at(dst))?;
    drop(writer);
    fs::remove_file(src).await.map_err(StorageError::at(src))?;
    Ok(())
}

/// Sorted regular file names in `dir`; a missing directory is empty.
pub async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::IoAt { path: dir.to_path_buf(), source: e }),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{runs, TempLayout};

    fn layout(temp: &TempLayout) -> StorageLayout {
        StorageLayout::new(temp.storage(), temp.tmp(), temp.staging())
    }

    fn raster(run: &str, layer: &str, hour: &str) -> ProcessedArtifact {
        ProcessedArtifact::new("arome", run, layer, hour, ArtifactFormat::Raster)
    }

    #[tokio::test]
    async fn test_marker_lifecycle() {
        let temp = TempLayout::new();
        let layout = layout(&temp);

        assert!(!layout.is_up_to_date("SP1", runs::CURRENT).await);
        layout.write_pending_marker("SP1", runs::CURRENT).await.unwrap();
        assert!(!layout.is_up_to_date("SP1", runs::CURRENT).await);

        layout.publish_marker("SP1").await.unwrap();
        assert!(layout.is_up_to_date("SP1", runs::CURRENT).await);
        assert!(!layout.is_up_to_date("SP1", runs::PREVIOUS).await);
    }

    #[tokio::test]
    async fn test_promote_package() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        let old = raster(runs::PREVIOUS, "temperature", "01");
        temp.write(&format!("storage/{}", old.file_name()), b"old");

        let new = vec![raster(runs::CURRENT, "temperature", "01"), raster(runs::CURRENT, "temperature", "02")];
        for a in &new {
            temp.write(&format!("tmp/{}", a.file_name()), b"new");
        }
        temp.write(&format!("tmp/{}", new[0].intermediate(".geojson")), b"{}");
        temp.write("tmp/unrelated.txt", b"keep");
        layout.write_pending_marker("SP1", runs::CURRENT).await.unwrap();

        layout
            .promote_package("SP1", &["temperature".to_string()], &new)
            .await
            .unwrap();

        let published = TempLayout::list(&temp.storage());
        assert_eq!(published.len(), 3);
        assert!(published.contains(&new[0].file_name()));
        assert!(!published.contains(&old.file_name()));
        assert!(layout.is_up_to_date("SP1", runs::CURRENT).await);
        assert_eq!(TempLayout::list(&temp.tmp()), vec!["unrelated.txt"]);
    }

    #[tokio::test]
    async fn test_promote_package_with_missing_artifact_keeps_marker_pending() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        let present = raster(runs::CURRENT, "temperature", "01");
        let missing = raster(runs::CURRENT, "temperature", "02");
        temp.write(&format!("tmp/{}", present.file_name()), b"new");
        layout.write_pending_marker("SP1", runs::CURRENT).await.unwrap();

        let err = layout
            .promote_package("SP1", &["temperature".to_string()], &[present.clone(), missing])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::PromotionIncomplete { failed: 1, total: 2, .. }));
        assert!(!layout.is_up_to_date("SP1", runs::CURRENT).await);
        assert!(!TempLayout::list(&temp.storage()).contains(&marker_file_name("SP1")));
        assert!(TempLayout::list(&temp.tmp()).contains(&marker_file_name("SP1")));
    }

    #[tokio::test]
    async fn test_latest_published_run() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        assert_eq!(layout.latest_published_run("arome").await.unwrap(), None);

        temp.write(&format!("storage/{}", raster(runs::PREVIOUS, "humidity", "01").file_name()), b"");
        temp.write(&format!("storage/{}", raster(runs::CURRENT, "humidity", "01").file_name()), b"");
        temp.write("storage/SP1_current_run_datetime.txt", runs::CURRENT.as_bytes());

        assert_eq!(
            layout.latest_published_run("arome").await.unwrap().as_deref(),
            Some(runs::CURRENT)
        );
        let path = layout
            .published_artifact("arome", "humidity", "01", ArtifactFormat::Raster)
            .await
            .unwrap()
            .unwrap();
        assert!(path.ends_with(raster(runs::CURRENT, "humidity", "01").file_name()));
        assert!(layout
            .published_artifact("arome", "humidity", "02", ArtifactFormat::Raster)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_published_artifact_resolves_per_layer() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        // SP1 already moved on, SP2 still serves the previous run
        let temperature = raster(runs::CURRENT, "temperature", "01");
        let humidity = raster(runs::PREVIOUS, "humidity", "01");
        temp.write(&format!("storage/{}", temperature.file_name()), b"");
        temp.write(&format!("storage/{}", humidity.file_name()), b"");

        let path = layout
            .published_artifact("arome", "humidity", "01", ArtifactFormat::Raster)
            .await
            .unwrap()
            .unwrap();
        assert!(path.ends_with(humidity.file_name()));

        let path = layout
            .published_artifact("arome", "temperature", "01", ArtifactFormat::Raster)
            .await
            .unwrap()
            .unwrap();
        assert!(path.ends_with(temperature.file_name()));

        assert!(layout
            .published_artifact("arome", "humidity", "01", ArtifactFormat::Vector)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_stale_staging() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        let old = raster(runs::PREVIOUS, "humidity", "01");
        let current = raster(runs::CURRENT, "humidity", "01");
        let other = ProcessedArtifact::new("arpege", runs::PREVIOUS, "humidity", "01", ArtifactFormat::Raster);
        for name in [
            old.file_name(),
            current.file_name(),
            other.file_name(),
            format!("{}.1234.partial", old.file_name()),
            format!("{}.5678.partial", current.file_name()),
        ] {
            temp.write(&format!("staging/{}", name), b"");
        }

        assert_eq!(layout.clear_stale_staging("arome", runs::CURRENT).await.unwrap(), 3);
        let mut expected = vec![current.file_name(), other.file_name()];
        expected.sort();
        assert_eq!(TempLayout::list(&temp.staging()), expected);
    }

    #[tokio::test]
    async fn test_stage_and_promote() {
        let temp = TempLayout::new();
        let layout = layout(&temp);
        let a = raster(runs::CURRENT, "humidity", "01");

        let staged = layout.stage(&a, b"tif").await.unwrap();
        assert_eq!(std::fs::read(&staged).unwrap(), b"tif");
        temp.write(&format!("staging/{}.abc.partial", a.file_name()), b"");
        assert_eq!(layout.staged_count("arome", runs::CURRENT).await.unwrap(), 1);

        let promoted = layout.promote_staged_run("arome", runs::CURRENT).await.unwrap();
        assert_eq!(promoted, vec![a.file_name()]);
        assert!(temp.storage().join(a.file_name()).exists());
        assert_eq!(layout.staged_count("arome", runs::CURRENT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_move_file() {
        let temp = TempLayout::new();
        temp.write("tmp/a.txt", b"data");
        move_file(&temp.tmp().join("a.txt"), &temp.storage().join("a.txt")).await.unwrap();
        assert_eq!(std::fs::read(temp.storage().join("a.txt")).unwrap(), b"data");
        assert!(!temp.tmp().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_cleanup_tmp_without_patterns_clears_all() {
        let temp = TempLayout::new();
        temp.write("tmp/a", b"");
        temp.write("tmp/b", b"");
        assert_eq!(layout(&temp).cleanup_tmp(&[]).await.unwrap(), 2);
    }
}
