//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use renderer::{GdalEngine, PaletteRegistry, RenderEngine};
use storage::{CompletenessGate, DiskTileCache, MemoryTileCache, StorageLayout, TileCache};
use tracing::info;
use weather_common::{AppConfig, ModelConfig};

/// Shared application state.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: Arc<ModelConfig>,
    pub layout: Arc<StorageLayout>,
    pub cache: Arc<dyn TileCache>,
    pub engine: Arc<dyn RenderEngine>,
    pub palettes: Arc<PaletteRegistry>,
    pub gate: CompletenessGate,
    /// Shared secret expected in the `Authorization` header of rollouts
    pub rollout_secret: String,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Build the production state: GDAL rendering and the configured cache.
    pub fn new(config: Arc<AppConfig>, model: Arc<ModelConfig>, metrics: PrometheusHandle) -> Result<Self> {
        let rollout_secret = config
            .rollout_secret
            .clone()
            .context("ROLLOUT_SECRET must be set")?;

        let cache: Arc<dyn TileCache> = match &config.tile_cache_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using disk tile cache");
                Arc::new(
                    DiskTileCache::open(dir, config.tile_cache_ttl)
                        .with_context(|| format!("Failed to open tile cache {}", dir.display()))?,
                )
            }
            None => Arc::new(MemoryTileCache::new(config.tile_cache_ttl)),
        };

        let layout = Arc::new(StorageLayout::from_config(&config));
        Ok(Self {
            gate: CompletenessGate::new(layout.clone()),
            layout,
            cache,
            engine: Arc::new(GdalEngine::new()),
            palettes: Arc::new(PaletteRegistry::with_defaults()),
            rollout_secret,
            metrics,
            config,
            model,
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn RenderEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TileCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Number of artifacts that make a run complete: hours x layers.
    pub fn expected_artifacts(&self) -> usize {
        self.config.hours().len() * self.model.layer_names().len()
    }
}
