//! Fetch, derive, render and publish one package run.
//!
//! Hours run with bounded parallelism, the layers of an hour run
//! concurrently, and CPU-heavy steps run on the blocking pool. A run is
//! only rolled out when every layer of every hour succeeded; otherwise the
//! marker stays unpublished and the next iteration retries the run.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use ingestion::decoder::FieldSamples;
use ingestion::features::FeatureCollection;
use ingestion::{derive_layer, GribDecoder, GridDecoder};
use renderer::engine::VECTOR_ZOOMS;
use renderer::{GdalEngine, PaletteRegistry, RasterGrid, RenderEngine};
use storage::StorageLayout;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use weather_common::{AppConfig, ArtifactFormat, LayerConfig, ModelConfig, PackageConfig, ProcessedArtifact};

use crate::download::{DownloadConfig, Fetcher, HttpFetcher};
use crate::oracle::{package_file_name, package_url, AvailabilityProbe, HttpProbe, RunOracle};
use crate::rollout::Rollout;

/// Result of one scheduling iteration for a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// No run is completely published upstream.
    Unavailable,
    /// The newest run is already published locally.
    UpToDate(String),
    /// Some hours, layers or uploads failed; the marker was not published.
    Incomplete { run: String, failed: usize },
    /// The run was rolled out.
    Published { run: String, artifacts: usize },
}

/// Artifacts produced for a run and the number of failed units.
#[derive(Debug, Default)]
pub struct RunReport {
    pub artifacts: Vec<ProcessedArtifact>,
    pub failed: usize,
}

pub struct Pipeline {
    config: Arc<AppConfig>,
    model: Arc<ModelConfig>,
    layout: Arc<StorageLayout>,
    oracle: RunOracle,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn GridDecoder>,
    engine: Arc<dyn RenderEngine>,
    palettes: Arc<PaletteRegistry>,
    rollout: Rollout,
}

impl Pipeline {
    /// Production pipeline: HTTP probes and downloads, GRIB decoding, GDAL rendering.
    pub fn new(config: Arc<AppConfig>, model: Arc<ModelConfig>) -> Result<Self> {
        let oracle = RunOracle::new(
            Arc::new(HttpProbe::new()?),
            config.upstream_base_url.clone(),
            config.hours(),
        );
        let rollout = Rollout::from_config(&config)?;

        Ok(Self {
            layout: Arc::new(StorageLayout::from_config(&config)),
            oracle,
            fetcher: Arc::new(HttpFetcher::new(DownloadConfig::default())?),
            decoder: Arc::new(GribDecoder::new()),
            engine: Arc::new(GdalEngine::new()),
            palettes: Arc::new(PaletteRegistry::with_defaults()),
            rollout,
            config,
            model,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn AvailabilityProbe>) -> Self {
        self.oracle = RunOracle::new(probe, self.config.upstream_base_url.clone(), self.config.hours());
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn GridDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_palettes(mut self, palettes: Arc<PaletteRegistry>) -> Self {
        self.palettes = palettes;
        self
    }

    pub fn with_rollout(mut self, rollout: Rollout) -> Self {
        self.rollout = rollout;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn rollout(&self) -> &Rollout {
        &self.rollout
    }

    /// One iteration for `package` against the current time.
    pub async fn run_package(&self, package: &PackageConfig) -> Result<IterationOutcome> {
        self.run_package_at(package, Utc::now()).await
    }

    /// discover -> skip if up to date -> process -> roll out.
    #[instrument(skip(self, package, now), fields(package = %package.name))]
    pub async fn run_package_at(&self, package: &PackageConfig, now: DateTime<Utc>) -> Result<IterationOutcome> {
        let Some(run) = self.oracle.discover(&package.name, now).await else {
            info!(package = %package.name, "No complete run available upstream");
            return Ok(IterationOutcome::Unavailable);
        };

        if self.layout.is_up_to_date(&package.name, &run).await {
            debug!(package = %package.name, run = %run, "Run already published");
            return Ok(IterationOutcome::UpToDate(run));
        }

        info!(package = %package.name, run = %run, "Processing run");
        self.layout.ensure_dirs().await?;
        self.layout.write_pending_marker(&package.name, &run).await?;

        let report = self.process_run(package, &run).await;
        if report.failed > 0 {
            warn!(
                package = %package.name,
                run = %run,
                failed = report.failed,
                produced = report.artifacts.len(),
                "Run incomplete, not rolling out"
            );
            return Ok(IterationOutcome::Incomplete {
                run,
                failed: report.failed,
            });
        }

        let failed = self
            .rollout
            .publish(&self.layout, &package.name, &package.layer_names(), &report.artifacts)
            .await
            .with_context(|| format!("Failed to roll out {} run {}", package.name, run))?;
        if failed > 0 {
            return Ok(IterationOutcome::Incomplete { run, failed });
        }

        info!(
            package = %package.name,
            run = %run,
            artifacts = report.artifacts.len(),
            "Run published"
        );
        Ok(IterationOutcome::Published {
            run,
            artifacts: report.artifacts.len(),
        })
    }

    /// Produce every layer x hour artifact of `run` into `tmp/`.
    pub async fn process_run(&self, package: &PackageConfig, run: &str) -> RunReport {
        let layers = package.layers.len();
        let results: Vec<(String, Result<Vec<Result<ProcessedArtifact>>>)> = stream::iter(self.oracle.hours())
            .map(|hour| async move { (hour.clone(), self.process_hour(package, run, hour).await) })
            .buffer_unordered(self.config.max_concurrent_hours.max(1))
            .collect()
            .await;

        let mut report = RunReport::default();
        for (hour, result) in results {
            match result {
                Ok(layer_results) => {
                    for result in layer_results {
                        match result {
                            Ok(artifact) => report.artifacts.push(artifact),
                            Err(e) => {
                                error!(package = %package.name, hour = %hour, error = %e, "Layer failed");
                                report.failed += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(package = %package.name, hour = %hour, error = %e, "Hour failed");
                    report.failed += layers;
                }
            }
        }
        report.artifacts.sort_by_key(|a| a.file_name());
        report
    }

    async fn process_hour(
        &self,
        package: &PackageConfig,
        run: &str,
        hour: &str,
    ) -> Result<Vec<Result<ProcessedArtifact>>> {
        let url = package_url(self.oracle.base_url(), run, &package.name, hour);
        let dest = self
            .layout
            .tmp_dir()
            .join(package_file_name(run, &package.name, hour));
        let source = self.fetcher.fetch(&url, &dest).await?;

        let decoder = self.decoder.clone();
        let variables = package.variable_names();
        let region = self.model.region_polygon();
        let path = source.clone();
        let fields = tokio::task::spawn_blocking(move || -> Result<FieldSamples> {
            let mut fields = decoder.decode(&path, &variables)?;
            if let Some(region) = region {
                for samples in fields.values_mut() {
                    *samples = region.filter(std::mem::take(samples));
                }
            }
            Ok(fields)
        })
        .await
        .context("Decode task failed")??;

        if let Err(e) = fs::remove_file(&source).await {
            debug!(path = %source.display(), error = %e, "Could not remove source file");
        }

        let fields = Arc::new(fields);
        let layers = package
            .layers
            .iter()
            .map(|layer| self.process_layer(layer, run, hour, fields.clone()));
        Ok(join_all(layers).await)
    }

    #[instrument(skip(self, layer, fields), fields(layer = %layer.name, hour = %hour))]
    async fn process_layer(
        &self,
        layer: &LayerConfig,
        run: &str,
        hour: &str,
        fields: Arc<FieldSamples>,
    ) -> Result<ProcessedArtifact> {
        let artifact = ProcessedArtifact::new(
            self.model.model.clone(),
            run,
            layer.name.clone(),
            hour,
            self.config.artifact_format,
        );

        let wanted = layer.field_names();
        let name = layer.name.clone();
        let derived = tokio::task::spawn_blocking(move || {
            let inputs: FieldSamples = fields
                .iter()
                .filter(|(variable, _)| wanted.is_empty() || wanted.contains(variable))
                .map(|(variable, samples)| (variable.clone(), samples.clone()))
                .collect();
            derive_layer(&name, &inputs)
        })
        .await
        .context("Derive task failed")?;

        if derived.is_empty() {
            bail!("No values derived for {}", artifact.base_name());
        }

        let tmp = self.layout.tmp_dir();
        match artifact.format {
            ArtifactFormat::Raster => {
                let palettes = self.palettes.clone();
                let name = layer.name.clone();
                let grid = tokio::task::spawn_blocking(move || {
                    RasterGrid::from_points(derived.values(), |v| palettes.color_for_value(&name, v))
                })
                .await
                .context("Rasterize task failed")??;
                self.engine.build_raster(&grid, tmp, &artifact).await?;
            }
            ArtifactFormat::Vector => {
                let features = tmp.join(artifact.intermediate(".geojson"));
                let path = features.clone();
                tokio::task::spawn_blocking(move || FeatureCollection::from_field(&derived).write_to(&path))
                    .await
                    .context("Feature export task failed")??;

                let result = self
                    .engine
                    .build_vector_tiles(&features, VECTOR_ZOOMS, &artifact.path_in(tmp))
                    .await;
                if let Err(e) = fs::remove_file(&features).await {
                    debug!(path = %features.display(), error = %e, "Could not remove features file");
                }
                result?;
            }
        }

        debug!(artifact = %artifact.file_name(), "Artifact built");
        Ok(artifact)
    }
}
