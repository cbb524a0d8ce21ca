//! Package file downloads with retry and exponential backoff.
//!
//! Bodies are streamed into `{dest}.partial` and renamed into place once
//! complete, so a half-written file is never mistaken for a finished one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Fetches one upstream file to a local path.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    config: DownloadConfig,
}

impl HttpFetcher {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    async fn download_once(&self, url: &str, partial: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await.context("HTTP request failed")?;
        match response.status() {
            StatusCode::OK => {}
            status => return Err(anyhow!("HTTP error: {}", status)),
        }

        let mut file = File::create(partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read response body")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, dest), fields(url = %url))]
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(dest);

        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.download_once(url, &partial).await {
                Ok(bytes) => {
                    if fs::rename(&partial, dest).await.is_err() {
                        fs::copy(&partial, dest).await?;
                        fs::remove_file(&partial).await?;
                    }
                    info!(path = %dest.display(), bytes, "Download completed");
                    return Ok(dest.to_path_buf());
                }
                Err(e) => {
                    retry_count += 1;
                    fs::remove_file(&partial).await.ok();

                    if retry_count > self.config.max_retries {
                        return Err(anyhow!("Download failed after {} retries: {}", retry_count - 1, e));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs(),
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }
}

/// Fetcher copying files from a local directory, for offline runs.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Fetcher for DirectoryFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let name = url.rsplit('/').next().unwrap_or(url);
        let source = self.root.join(name);
        debug!(source = %source.display(), "Copying package file");
        fs::copy(&source, dest)
            .await
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        Ok(dest.to_path_buf())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}
