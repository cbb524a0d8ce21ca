//! Run discovery: find the newest run that is completely published upstream.
//!
//! A run is only accepted when every forecast hour of the package answers a
//! probe. Probe failures of any kind count as "not there yet".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, instrument};
use weather_common::run::candidate_runs;

/// Answers whether a single upstream file exists.
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn is_available(&self, url: &str) -> bool;
}

/// Probe issuing HEAD requests.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(8)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AvailabilityProbe for HttpProbe {
    async fn is_available(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD request failed");
                false
            }
        }
    }
}

/// Probe answering from a predicate over the URL.
pub struct PredicateProbe<F> {
    predicate: F,
}

impl<F> PredicateProbe<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> AvailabilityProbe for PredicateProbe<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn is_available(&self, url: &str) -> bool {
        (self.predicate)(url)
    }
}

/// URL of one package file for a run and forecast hour.
pub fn package_url(base: &str, run: &str, package: &str, hour: &str) -> String {
    format!(
        "{base}/{run}/arome/001/{package}/arome__001__{package}__{hour}H__{run}.grib2",
        base = base.trim_end_matches('/'),
    )
}

/// File name of a package file, as stored in `tmp/`.
pub fn package_file_name(run: &str, package: &str, hour: &str) -> String {
    format!("arome__001__{package}__{hour}H__{run}.grib2")
}

pub struct RunOracle {
    probe: Arc<dyn AvailabilityProbe>,
    base_url: String,
    hours: Vec<String>,
}

impl RunOracle {
    pub fn new(probe: Arc<dyn AvailabilityProbe>, base_url: impl Into<String>, hours: Vec<String>) -> Self {
        Self {
            probe,
            base_url: base_url.into(),
            hours,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn hours(&self) -> &[String] {
        &self.hours
    }

    /// Whether every hour of `package` exists upstream for `run`.
    pub async fn is_run_available(&self, package: &str, run: &str) -> bool {
        let probes = self.hours.iter().map(|hour| {
            let url = package_url(&self.base_url, run, package, hour);
            async move { self.probe.is_available(&url).await }
        });
        join_all(probes).await.into_iter().all(|ok| ok)
    }

    /// Newest completely published run of `package` relative to `now`.
    #[instrument(skip(self, now))]
    pub async fn discover(&self, package: &str, now: DateTime<Utc>) -> Option<String> {
        for run in candidate_runs(now) {
            if self.is_run_available(package, &run).await {
                info!(package = %package, run = %run, "Found available run");
                return Some(run);
            }
            debug!(package = %package, run = %run, "Run not completely published");
        }
        None
    }
}
