//! `GET /metadata.json?model=X`

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use weather_common::artifact::is_model_name;
use weather_common::run::parse_run;
use weather_common::WeatherError;

use super::error::ApiError;
use crate::state::AppState;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Lead time between a run and its first served hour.
const START_OFFSET_HOURS: i64 = 2;

#[derive(Debug, Deserialize)]
pub struct MetadataParams {
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataResponse {
    pub run_hour: String,
    pub start_hour: String,
}

pub async fn metadata_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<MetadataParams>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let model = params
        .model
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Model is required".to_string()))?;
    if !is_model_name(&model) {
        return Err(ApiError::BadRequest(format!("Invalid model: {}", model)));
    }

    let run = state
        .layout
        .latest_published_run(&model)
        .await?
        .ok_or_else(|| WeatherError::NoPublishedRun(model.clone()))?;
    let instant = parse_run(&run)
        .ok_or_else(|| WeatherError::InternalError(format!("Unparseable run id {}", run)))?;

    Ok(Json(MetadataResponse {
        run_hour: instant.format(TIMESTAMP_FORMAT).to_string(),
        start_hour: (instant + Duration::hours(START_OFFSET_HOURS))
            .format(TIMESTAMP_FORMAT)
            .to_string(),
    }))
}
