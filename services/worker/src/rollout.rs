//! Publishing finished runs, locally or to a remote tile server.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use storage::StorageLayout;
use tokio::fs;
use tracing::{error, info, instrument};
use weather_common::{AppConfig, ProcessedArtifact};

/// Where finished artifacts go.
pub enum Rollout {
    /// Move artifacts into the local `storage/` directory.
    Local,
    /// Upload artifacts to a tile server's `/rollout` endpoint.
    Remote(RemoteRollout),
}

pub struct RemoteRollout {
    client: Client,
    host: String,
    secret: String,
}

impl RemoteRollout {
    pub fn new(host: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rollout", self.host)
    }

    /// Upload one artifact from `layout`'s tmp directory.
    #[instrument(skip(self, layout), fields(file = %artifact.file_name()))]
    pub async fn upload(&self, layout: &StorageLayout, artifact: &ProcessedArtifact) -> Result<()> {
        let path = artifact.path_in(layout.tmp_dir());
        let data = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let file = Part::bytes(data)
            .file_name(artifact.file_name())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("model", artifact.model.clone())
            .text("run", artifact.run.clone())
            .text("layer", artifact.layer.clone())
            .text("hour", artifact.hour.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint())
            .header(header::AUTHORIZATION, &self.secret)
            .multipart(form)
            .send()
            .await
            .context("Rollout request failed")?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Rollout rejected with {}: {}", status, body))
            }
        }
    }
}

impl Rollout {
    /// Remote when a target host is configured, local otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match &config.rollout_target_host {
            Some(host) => {
                let secret = config
                    .rollout_secret
                    .clone()
                    .ok_or_else(|| anyhow!("ROLLOUT_TARGET_HOST is set but ROLLOUT_SECRET is missing"))?;
                Ok(Rollout::Remote(RemoteRollout::new(host, secret)?))
            }
            None => Ok(Rollout::Local),
        }
    }

    /// Publish the finished run of `package`.
    ///
    /// Returns the number of artifacts that could not be uploaded. When any
    /// upload fails the marker stays pending and `tmp/` is left intact, so
    /// the next iteration processes the run again.
    pub async fn publish(
        &self,
        layout: &StorageLayout,
        package: &str,
        layers: &[String],
        artifacts: &[ProcessedArtifact],
    ) -> Result<usize> {
        match self {
            Rollout::Local => {
                layout.promote_package(package, layers, artifacts).await?;
                Ok(0)
            }
            Rollout::Remote(remote) => {
                let mut failed = 0;
                for artifact in artifacts {
                    match remote.upload(layout, artifact).await {
                        Ok(()) => {
                            metrics::counter!("rollout_uploads_total", "status" => "created").increment(1);
                        }
                        Err(e) => {
                            failed += 1;
                            metrics::counter!("rollout_uploads_total", "status" => "failed").increment(1);
                            error!(file = %artifact.file_name(), error = %e, "Failed to roll out artifact");
                        }
                    }
                }

                if failed > 0 {
                    error!(
                        package = %package,
                        uploaded = artifacts.len() - failed,
                        failed,
                        "Remote rollout incomplete, marker not published"
                    );
                    return Ok(failed);
                }

                layout.publish_marker(package).await?;
                let mut patterns: Vec<&str> = layers.iter().map(String::as_str).collect();
                patterns.push(package);
                layout.cleanup_tmp(&patterns).await?;

                info!(
                    package = %package,
                    uploaded = artifacts.len(),
                    "Rolled out to remote server"
                );
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_without_target() {
        let config = AppConfig::default();
        assert!(matches!(Rollout::from_config(&config).unwrap(), Rollout::Local));
    }

    #[test]
    fn test_remote_requires_secret() {
        let config = AppConfig {
            rollout_target_host: Some("https://tiles.example.com".into()),
            ..AppConfig::default()
        };
        assert!(Rollout::from_config(&config).is_err());

        let config = AppConfig {
            rollout_secret: Some("s3cret".into()),
            ..config
        };
        match Rollout::from_config(&config).unwrap() {
            Rollout::Remote(remote) => assert_eq!(remote.endpoint(), "https://tiles.example.com/rollout"),
            Rollout::Local => panic!("expected a remote rollout"),
        }
    }
}
