//! Weather tiles worker service.
//!
//! Polls upstream for complete model runs and, per package:
//! - downloads every forecast hour
//! - derives each configured layer
//! - renders rasters or vector tiles
//! - rolls the finished run out locally or to a tile server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use weather_common::{AppConfig, ModelConfig};
use worker::{scheduler, DirectoryFetcher, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "weather-worker")]
#[command(about = "Derive and publish weather tiles from upstream model runs")]
struct Args {
    /// Run one iteration per package and exit
    #[arg(long)]
    once: bool,

    /// Only process this package (default: all configured)
    #[arg(short, long)]
    package: Option<String>,

    /// Model configuration YAML
    #[arg(long, env = "MODEL_CONFIG")]
    model_config: Option<PathBuf>,

    /// Directory for published artifacts
    #[arg(long, env = "STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Directory for in-flight files
    #[arg(long, env = "TMP_DIR")]
    tmp_dir: Option<PathBuf>,

    /// Read package files from this directory instead of downloading them
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Log level (default: debug when DEBUG=true, info otherwise)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(path) = args.model_config {
        config.model_config_path = path;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(dir) = args.tmp_dir {
        config.tmp_dir = dir;
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
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting weather tiles worker");

    let mut model = ModelConfig::from_file(&config.model_config_path).with_context(|| {
        format!(
            "Failed to load model config {}",
            config.model_config_path.display()
        )
    })?;
    if let Some(name) = &args.package {
        model.packages.retain(|p| &p.name == name);
        if model.packages.is_empty() {
            anyhow::bail!("Package {} is not configured", name);
        }
    }

    tokio::fs::create_dir_all(&config.storage_dir).await?;
    tokio::fs::create_dir_all(&config.tmp_dir).await?;

    info!(
        model = %model.model,
        packages = model.packages.len(),
        hours = config.hours().len(),
        format = ?config.artifact_format,
        remote = config.rollout_target_host.is_some(),
        "Loaded configuration"
    );

    let mut pipeline = Pipeline::new(Arc::new(config), Arc::new(model))?;
    if let Some(dir) = args.source_dir {
        pipeline = pipeline.with_fetcher(Arc::new(DirectoryFetcher::new(dir)));
    }
    let pipeline = Arc::new(pipeline);

    if args.once {
        info!("Running single iteration");
        for (package, outcome) in scheduler::run_once(&pipeline).await {
            match outcome {
                Ok(outcome) => info!(package = %package, outcome = ?outcome, "Iteration complete"),
                Err(e) => error!(package = %package, error = %e, "Iteration failed"),
            }
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.cancel();
    });

    info!("Starting continuous polling");
    scheduler::run_forever(pipeline, cancel).await;

    info!("Worker stopped");
    Ok(())
}
