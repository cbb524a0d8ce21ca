//! End-to-end pipeline iterations against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ingestion::MemoryDecoder;
use renderer::MemoryEngine;
use storage::MbTiles;
use test_utils::{bbox, models, package_samples, runs, TempLayout};
use weather_common::artifact::marker_file_name;
use weather_common::{AppConfig, ArtifactFormat, ModelConfig, ProcessedArtifact, TileCoord};
use worker::oracle::RunOracle;
use worker::rollout::RemoteRollout;
use worker::{Fetcher, IterationOutcome, Pipeline, PredicateProbe, Rollout};

// ============================================================================
// Helpers
// ============================================================================

/// Writes a placeholder file; the memory decoder ignores the contents.
struct StubFetcher {
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, _url: &str, dest: &Path) -> anyhow::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, b"GRIB").await?;
        Ok(dest.to_path_buf())
    }
}

/// 07:30 on the day of the fixture runs, so the 06:00 run is the newest candidate.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 7, 30, 0).unwrap()
}

fn config(temp: &TempLayout, format: ArtifactFormat) -> AppConfig {
    AppConfig {
        storage_dir: temp.storage(),
        tmp_dir: temp.tmp(),
        staging_dir: temp.staging(),
        upstream_base_url: "http://upstream.test/pnt".to_string(),
        forecast_start_hour: 1,
        forecast_end_hour: 2,
        max_concurrent_hours: 2,
        artifact_format: format,
        ..AppConfig::default()
    }
}

fn pipeline(temp: &TempLayout, format: ArtifactFormat, variables: &[&str]) -> Pipeline {
    let model = ModelConfig::from_yaml(models::TWO_LAYERS).unwrap();
    let decoder = MemoryDecoder::new(package_samples(variables, bbox::VALENCIA, 0.05));
    let probe = PredicateProbe::new(|url: &str| url.contains(runs::CURRENT));

    Pipeline::new(Arc::new(config(temp, format)), Arc::new(model))
        .unwrap()
        .with_probe(Arc::new(probe))
        .with_fetcher(Arc::new(StubFetcher::new()))
        .with_decoder(Arc::new(decoder))
        .with_engine(Arc::new(MemoryEngine::new()))
}

fn seed_previous_run(temp: &TempLayout) -> ProcessedArtifact {
    let old = ProcessedArtifact::new("arome", runs::PREVIOUS, "temperature", "01", ArtifactFormat::Raster);
    temp.write(&format!("storage/{}", old.file_name()), b"old");
    temp.write(&format!("storage/{}", marker_file_name("SP1")), runs::PREVIOUS.as_bytes());
    old
}

fn marker(temp: &TempLayout) -> String {
    std::fs::read_to_string(temp.storage().join(marker_file_name("SP1"))).unwrap()
}

// ============================================================================
// Raster runs
// ============================================================================

#[tokio::test]
async fn test_two_hours_two_layers_publish_four_artifacts() {
    let temp = TempLayout::new();
    let old = seed_previous_run(&temp);
    let pipeline = pipeline(&temp, ArtifactFormat::Raster, &["2t", "2r"]);
    let package = pipeline.model().packages[0].clone();

    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert_eq!(
        outcome,
        IterationOutcome::Published {
            run: runs::CURRENT.to_string(),
            artifacts: 4
        }
    );

    let published = TempLayout::list(&temp.storage());
    let artifacts: Vec<_> = published.iter().filter(|n| n.ends_with("_cog.tif")).collect();
    assert_eq!(artifacts.len(), 4);
    assert!(artifacts.iter().all(|n| n.contains(runs::CURRENT)));
    assert!(!published.contains(&old.file_name()));
    assert_eq!(marker(&temp), runs::CURRENT);

    // package leftovers are cleared from tmp
    assert!(TempLayout::list(&temp.tmp()).is_empty());
}

#[tokio::test]
async fn test_published_run_is_not_reprocessed() {
    let temp = TempLayout::new();
    let pipeline = pipeline(&temp, ArtifactFormat::Raster, &["2t", "2r"]);
    let package = pipeline.model().packages[0].clone();

    let first = pipeline.run_package_at(&package, now()).await.unwrap();
    assert!(matches!(first, IterationOutcome::Published { .. }));

    let second = pipeline.run_package_at(&package, now()).await.unwrap();
    assert_eq!(second, IterationOutcome::UpToDate(runs::CURRENT.to_string()));
}

#[tokio::test]
async fn test_failed_layer_keeps_previous_marker() {
    let temp = TempLayout::new();
    seed_previous_run(&temp);
    // no humidity input: the humidity layer fails for both hours
    let pipeline = pipeline(&temp, ArtifactFormat::Raster, &["2t"]);
    let package = pipeline.model().packages[0].clone();

    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert_eq!(
        outcome,
        IterationOutcome::Incomplete {
            run: runs::CURRENT.to_string(),
            failed: 2
        }
    );
    assert_eq!(marker(&temp), runs::PREVIOUS);
    assert!(!TempLayout::list(&temp.storage())
        .iter()
        .any(|n| n.contains(runs::CURRENT)));
}

#[tokio::test]
async fn test_nothing_available_upstream() {
    let temp = TempLayout::new();
    let pipeline = pipeline(&temp, ArtifactFormat::Raster, &["2t", "2r"])
        .with_probe(Arc::new(PredicateProbe::new(|_: &str| false)));
    let package = pipeline.model().packages[0].clone();

    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert_eq!(outcome, IterationOutcome::Unavailable);
    assert!(TempLayout::list(&temp.storage()).is_empty());
}

// ============================================================================
// Vector runs
// ============================================================================

#[tokio::test]
async fn test_vector_run_publishes_archives() {
    let temp = TempLayout::new();
    let pipeline = pipeline(&temp, ArtifactFormat::Vector, &["2t", "2r"]);
    let package = pipeline.model().packages[0].clone();

    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert!(matches!(outcome, IterationOutcome::Published { artifacts: 4, .. }));

    let archive = ProcessedArtifact::new("arome", runs::CURRENT, "humidity", "02", ArtifactFormat::Vector);
    let archive = MbTiles::open(&archive.path_in(&temp.storage())).await.unwrap();
    assert!(archive.tile_count().await.unwrap() > 0);
    assert!(archive.tile(&TileCoord::new(0, 0, 0)).await.unwrap().is_some());
}

// ============================================================================
// Remote rollout
// ============================================================================

#[tokio::test]
async fn test_failed_remote_rollout_is_retried() {
    let temp = TempLayout::new();
    let remote = RemoteRollout::new("http://127.0.0.1:1", "s3cret").unwrap();
    let pipeline = pipeline(&temp, ArtifactFormat::Raster, &["2t", "2r"]).with_rollout(Rollout::Remote(remote));
    let package = pipeline.model().packages[0].clone();

    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert_eq!(
        outcome,
        IterationOutcome::Incomplete {
            run: runs::CURRENT.to_string(),
            failed: 4,
        }
    );

    // nothing published; artifacts and pending marker wait in tmp
    assert!(TempLayout::list(&temp.storage()).is_empty());
    let tmp = TempLayout::list(&temp.tmp());
    assert!(tmp.contains(&marker_file_name("SP1")));
    assert_eq!(tmp.iter().filter(|n| n.ends_with("_cog.tif")).count(), 4);

    // the next iteration processes the run again instead of skipping it
    let outcome = pipeline.run_package_at(&package, now()).await.unwrap();
    assert!(matches!(outcome, IterationOutcome::Incomplete { failed: 4, .. }));
}

// ============================================================================
// Run discovery
// ============================================================================

#[tokio::test]
async fn test_oracle_returns_third_newest_candidate() {
    let late = Utc.with_ymd_and_hms(2024, 6, 1, 23, 10, 0).unwrap();
    let probes = Arc::new(AtomicUsize::new(0));
    let counter = probes.clone();
    let probe = PredicateProbe::new(move |url: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        url.contains("2024-06-01T15:00:00Z")
    });

    let oracle = RunOracle::new(Arc::new(probe), "http://upstream.test/pnt", vec!["00".into(), "01".into()]);
    assert_eq!(
        oracle.discover("SP1", late).await.as_deref(),
        Some("2024-06-01T15:00:00Z")
    );
    // 21:00 and 18:00 are probed before 15:00 is accepted
    assert_eq!(probes.load(Ordering::SeqCst), 6);
}

// ============================================================================
// Shipped configuration
// ============================================================================

#[tokio::test]
async fn test_shipped_model_config_builds_pipeline() {
    let model = ModelConfig::from_file(test_utils::workspace_file("config/arome.yml")).unwrap();
    assert_eq!(model.model, "arome");
    assert!(model.layer_names().contains(&"temperature".to_string()));

    let temp = TempLayout::new();
    let pipeline = Pipeline::new(Arc::new(config(&temp, ArtifactFormat::Raster)), Arc::new(model)).unwrap();
    assert!(matches!(pipeline.rollout(), Rollout::Local));
}
