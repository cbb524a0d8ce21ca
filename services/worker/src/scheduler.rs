//! Per-package polling loops.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use weather_common::PackageConfig;

use crate::pipeline::{IterationOutcome, Pipeline};

/// Sleep before the next iteration after `outcome`.
pub fn pause_after(outcome: &anyhow::Result<IterationOutcome>, poll_interval: Duration, backoff: Duration) -> Duration {
    match outcome {
        Ok(IterationOutcome::Unavailable) => backoff,
        _ => poll_interval,
    }
}

/// Poll one package until `cancel` fires.
pub async fn run_package_loop(pipeline: Arc<Pipeline>, package: PackageConfig, cancel: CancellationToken) {
    info!(package = %package.name, "Starting package loop");

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = pipeline.run_package(&package) => outcome,
        };

        match &outcome {
            Ok(IterationOutcome::Published { run, artifacts }) => {
                info!(package = %package.name, run = %run, artifacts, "Iteration published a run");
            }
            Ok(IterationOutcome::Incomplete { run, failed }) => {
                info!(package = %package.name, run = %run, failed, "Iteration incomplete, will retry");
            }
            Ok(_) => {}
            Err(e) => error!(package = %package.name, error = %e, "Iteration failed"),
        }

        let config = pipeline.config();
        let pause = pause_after(&outcome, config.poll_interval, config.backoff);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!(package = %package.name, "Package loop stopped");
}

/// Run the loops of every package in parallel until `cancel` fires.
pub async fn run_forever(pipeline: Arc<Pipeline>, cancel: CancellationToken) {
    let loops = pipeline
        .model()
        .packages
        .clone()
        .into_iter()
        .map(|package| run_package_loop(pipeline.clone(), package, cancel.clone()));
    join_all(loops).await;
}

/// One iteration of every package, in parallel.
pub async fn run_once(pipeline: &Pipeline) -> Vec<(String, anyhow::Result<IterationOutcome>)> {
    let iterations = pipeline.model().packages.iter().map(|package| async move {
        (package.name.clone(), pipeline.run_package(package).await)
    });
    join_all(iterations).await
}
