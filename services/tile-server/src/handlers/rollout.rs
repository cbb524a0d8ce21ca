//! `POST /rollout`: receive one artifact pushed by a worker.
//!
//! The upload is staged first; the completeness gate then promotes the
//! whole run once every expected artifact has arrived.

use std::sync::Arc;

use axum::extract::{Extension, Multipart};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde_json::json;
use storage::GateOutcome;
use tracing::{error, info, instrument, warn};
use weather_common::artifact::{is_hour, is_model_name, is_run_id, is_safe_component};
use weather_common::{ArtifactFormat, ProcessedArtifact};

use crate::precache;
use crate::state::AppState;

/// Fields of a rollout form.
#[derive(Debug, Default)]
pub struct RolloutUpload {
    pub model: Option<String>,
    pub run: Option<String>,
    pub layer: Option<String>,
    pub hour: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<Bytes>,
}

impl RolloutUpload {
    pub async fn read(mut multipart: Multipart) -> Result<Self, String> {
        let mut upload = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    upload.file_name = field.file_name().map(str::to_string);
                    upload.file = Some(field.bytes().await.map_err(|e| e.to_string())?);
                }
                "model" | "run" | "layer" | "hour" => {
                    let value = field.text().await.map_err(|e| e.to_string())?;
                    let slot = match name.as_str() {
                        "model" => &mut upload.model,
                        "run" => &mut upload.run,
                        "layer" => &mut upload.layer,
                        _ => &mut upload.hour,
                    };
                    *slot = Some(value.trim().to_string());
                }
                _ => {}
            }
        }
        Ok(upload)
    }

    /// Validate the fields into the artifact they describe.
    ///
    /// The format follows the uploaded file name, falling back to `default`.
    pub fn artifact(&self, default: ArtifactFormat) -> Result<(ProcessedArtifact, &Bytes), String> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("Missing field: {}", name))
        };
        let model = field(&self.model, "model")?;
        let run = field(&self.run, "run")?;
        let layer = field(&self.layer, "layer")?;
        let hour = field(&self.hour, "hour")?;
        let file = self.file.as_ref().ok_or_else(|| "No file uploaded".to_string())?;

        if !is_model_name(&model) || !is_safe_component(&layer) {
            return Err("Invalid model or layer name".to_string());
        }
        if !is_run_id(&run) {
            return Err(format!("Invalid run: {}", run));
        }
        if !is_hour(&hour) {
            return Err(format!("Invalid hour: {}", hour));
        }

        let format = match self.file_name.as_deref() {
            Some(name) if name.ends_with(ArtifactFormat::Vector.suffix()) => ArtifactFormat::Vector,
            Some(name) if name.ends_with(ArtifactFormat::Raster.suffix()) => ArtifactFormat::Raster,
            _ => default,
        };
        Ok((ProcessedArtifact::new(model, run, layer, hour, format), file))
    }
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == secret)
        .unwrap_or(false)
}

fn reply(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

#[instrument(skip(state, headers, multipart))]
pub async fn rollout_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if !authorized(&headers, &state.rollout_secret) {
        warn!("Rejected rollout with a missing or wrong secret");
        return reply(StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }));
    }

    let upload = match RolloutUpload::read(multipart).await {
        Ok(upload) => upload,
        Err(e) => return reply(StatusCode::BAD_REQUEST, json!({ "error": e })),
    };
    let (artifact, data) = match upload.artifact(state.config.artifact_format) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(error = %e, "Rejected malformed rollout");
            return reply(StatusCode::BAD_REQUEST, json!({ "error": e }));
        }
    };

    if let Err(e) = state.layout.stage(&artifact, data).await {
        error!(file = %artifact.file_name(), error = %e, "Failed to stage upload");
        return reply(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Failed to write file" }));
    }
    info!(file = %artifact.file_name(), bytes = data.len(), "Staged upload");

    let expected = state.expected_artifacts();
    let promoted = match state.gate.check(&artifact.model, &artifact.run, expected).await {
        Ok(GateOutcome::Pending { .. }) => false,
        Ok(GateOutcome::Promoted(names)) => {
            metrics::counter!("runs_promoted_total").increment(1);
            if state.config.precache {
                tokio::spawn(precache::warm_promoted(state.clone(), names));
            }
            true
        }
        Err(e) => {
            error!(run = %artifact.run, error = %e, "Completeness gate failed");
            return reply(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Failed to promote run" }));
        }
    };

    reply(
        StatusCode::CREATED,
        json!({ "file": artifact.file_name(), "promoted": promoted }),
    )
}
