//! Weather tile server.
//!
//! Serves raster, vector and value tiles of the published runs, and
//! receives runs rolled out by workers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weather_common::{AppConfig, ModelConfig};

use tile_server::state::AppState;
use tile_server::{router, sweep};

#[derive(Parser, Debug)]
#[command(name = "tile-server")]
#[command(about = "Weather tile server")]
struct Args {
    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Model configuration YAML
    #[arg(long, env = "MODEL_CONFIG")]
    model_config: Option<PathBuf>,

    /// Directory for published artifacts
    #[arg(long, env = "STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Directory for received uploads
    #[arg(long, env = "STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Log level (default: debug when DEBUG=true, info otherwise)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.model_config {
        config.model_config_path = path;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(dir) = args.staging_dir {
        config.staging_dir = dir;
    }

    let level = match args
        .log_level
        .as_deref()
        .unwrap_or(config.default_log_level())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let model = ModelConfig::from_file(&config.model_config_path).with_context(|| {
        format!(
            "Failed to load model config {}",
            config.model_config_path.display()
        )
    })?;

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone(), Arc::new(model), prometheus_handle)?);
    state.layout.ensure_dirs().await?;

    info!(
        model = %state.model.model,
        expected_artifacts = state.expected_artifacts(),
        precache = config.precache,
        "Starting weather tile server"
    );

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(sweep::run_sweeper(
        state.cache.clone(),
        config.tile_cache_sweep_interval,
        cancel.clone(),
    ));

    let app = router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    sweeper.await.ok();
    Ok(())
}
