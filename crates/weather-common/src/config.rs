//! Process configuration shared by the worker and the tile server.
//!
//! Values come from the environment (optionally seeded from a `.env` file
//! by the binaries) and fall back to defaults suited to a single-node
//! deployment.

use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::ArtifactFormat;
use crate::run::{forecast_hours, resolve_hour_window};

/// Default upstream object store prefix for AROME packages.
pub const DEFAULT_UPSTREAM_BASE_URL: &str =
    "https://object.files.data.gouv.fr/meteofrance-pnt/pnt";

/// Every tunable of the system in one place.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the model YAML
    pub model_config_path: PathBuf,
    /// Published artifacts and run markers
    pub storage_dir: PathBuf,
    /// In-flight worker files
    pub tmp_dir: PathBuf,
    /// Received uploads awaiting the completeness gate
    pub staging_dir: PathBuf,
    /// Upstream URL prefix
    pub upstream_base_url: String,
    pub forecast_start_hour: u32,
    pub forecast_end_hour: u32,
    /// Sleep between successful iterations
    pub poll_interval: Duration,
    /// Sleep when no run is available upstream
    pub backoff: Duration,
    pub max_concurrent_hours: usize,
    pub rollout_secret: Option<String>,
    pub rollout_target_host: Option<String>,
    pub port: u16,
    pub debug: bool,
    /// Allowed CORS origin
    pub host_origin: String,
    pub tile_cache_ttl: Duration,
    pub tile_cache_sweep_interval: Duration,
    /// When set, tiles are cached on disk instead of in memory
    pub tile_cache_dir: Option<PathBuf>,
    pub artifact_format: ArtifactFormat,
    /// Warm the cache after a run is promoted
    pub precache: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_config_path: PathBuf::from("config/arome.yml"),
            storage_dir: PathBuf::from("storage"),
            tmp_dir: PathBuf::from("tmp"),
            staging_dir: PathBuf::from("staging"),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            forecast_start_hour: 0,
            forecast_end_hour: 51,
            poll_interval: Duration::from_secs(300),
            backoff: Duration::from_secs(600),
            max_concurrent_hours: 4,
            rollout_secret: None,
            rollout_target_host: None,
            port: 8080,
            debug: false,
            host_origin: "http://localhost:3000".to_string(),
            tile_cache_ttl: Duration::from_secs(30 * 60),
            tile_cache_sweep_interval: Duration::from_secs(5 * 60),
            tile_cache_dir: None,
            artifact_format: ArtifactFormat::Raster,
            precache: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_u64 = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let flag = |key: &str| {
            get(key).map(|v| {
                let v = v.to_lowercase();
                v == "true" || v == "1" || v == "yes"
            })
        };

        let (forecast_start_hour, forecast_end_hour) = resolve_hour_window(
            get("FORECAST_START_HOUR").and_then(|v| v.trim().parse().ok()),
            get("FORECAST_END_HOUR").and_then(|v| v.trim().parse().ok()),
        );

        Self {
            model_config_path: get("MODEL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_config_path),
            storage_dir: get("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            tmp_dir: get("TMP_DIR").map(PathBuf::from).unwrap_or(defaults.tmp_dir),
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            upstream_base_url: get("UPSTREAM_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_base_url),
            forecast_start_hour,
            forecast_end_hour,
            poll_interval: parse_u64("POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            backoff: parse_u64("BACKOFF_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.backoff),
            max_concurrent_hours: parse_u64("MAX_CONCURRENT_HOURS")
                .map(|v| v.max(1) as usize)
                .unwrap_or(defaults.max_concurrent_hours),
            rollout_secret: get("ROLLOUT_SECRET"),
            rollout_target_host: get("ROLLOUT_TARGET_HOST")
                .map(|v| v.trim_end_matches('/').to_string()),
            port: get("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            debug: flag("DEBUG").unwrap_or(defaults.debug),
            host_origin: get("HOST_ORIGIN").unwrap_or(defaults.host_origin),
            tile_cache_ttl: parse_u64("TILE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tile_cache_ttl),
            tile_cache_sweep_interval: parse_u64("TILE_CACHE_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tile_cache_sweep_interval),
            tile_cache_dir: get("TILE_CACHE_DIR").map(PathBuf::from),
            artifact_format: get("ARTIFACT_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.artifact_format),
            precache: flag("PRECACHE").unwrap_or(defaults.precache),
        }
    }

    /// Forecast hours to process, formatted `{:02}`.
    pub fn hours(&self) -> Vec<String> {
        forecast_hours(self.forecast_start_hour, self.forecast_end_hour)
    }

    /// Log level implied by `DEBUG` when no explicit level is given.
    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
