//! Rollout uploads and run promotion through the HTTP API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use test_utils::{models, runs, TempLayout};
use tile_server::router;
use tile_server::state::AppState;
use tower::ServiceExt;
use weather_common::{AppConfig, ArtifactFormat, ModelConfig, ProcessedArtifact};

// ============================================================================
// Helpers
// ============================================================================

const SECRET: &str = "s3cret";
const BOUNDARY: &str = "weather-rollout-boundary";

fn state(temp: &TempLayout) -> Arc<AppState> {
    let config = AppConfig {
        storage_dir: temp.storage(),
        tmp_dir: temp.tmp(),
        staging_dir: temp.staging(),
        forecast_start_hour: 1,
        forecast_end_hour: 2,
        rollout_secret: Some(SECRET.to_string()),
        precache: false,
        ..AppConfig::default()
    };
    let model = ModelConfig::from_yaml(models::TWO_LAYERS).unwrap();
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    Arc::new(AppState::new(Arc::new(config), Arc::new(model), metrics).unwrap())
}

fn app(state: Arc<AppState>) -> Router {
    router(state).unwrap()
}

/// Multipart body with the given text fields and an optional file part.
fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn artifact(run: &str, layer: &str, hour: &str) -> ProcessedArtifact {
    ProcessedArtifact::new("arome", run, layer, hour, ArtifactFormat::Raster)
}

async fn upload(app: Router, artifact: &ProcessedArtifact, secret: Option<&str>) -> Response {
    let fields = [
        ("model", artifact.model.as_str()),
        ("run", artifact.run.as_str()),
        ("layer", artifact.layer.as_str()),
        ("hour", artifact.hour.as_str()),
    ];
    let name = artifact.file_name();
    send(app, multipart_body(&fields, Some((name.as_str(), &b"cog"[..]))), secret).await
}

async fn send(app: Router, body: Vec<u8>, secret: Option<&str>) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri("/rollout")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(secret) = secret {
        request = request.header(header::AUTHORIZATION, secret);
    }
    app.oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Authorization and validation
// ============================================================================

#[tokio::test]
async fn test_rejects_missing_secret() {
    let temp = TempLayout::new();
    let current = artifact(runs::CURRENT, "temperature", "01");

    let response = upload(app(state(&temp)), &current, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(TempLayout::list(&temp.staging()).is_empty());
}

#[tokio::test]
async fn test_rejects_wrong_secret() {
    let temp = TempLayout::new();
    let current = artifact(runs::CURRENT, "temperature", "01");

    let response = upload(app(state(&temp)), &current, Some("guess")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejects_missing_hour() {
    let temp = TempLayout::new();
    let body = multipart_body(
        &[("model", "arome"), ("run", runs::CURRENT), ("layer", "temperature")],
        Some(("upload_cog.tif", &b"cog"[..])),
    );

    let response = send(app(state(&temp)), body, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing field: hour");
}

#[tokio::test]
async fn test_rejects_missing_file() {
    let temp = TempLayout::new();
    let body = multipart_body(
        &[
            ("model", "arome"),
            ("run", runs::CURRENT),
            ("layer", "temperature"),
            ("hour", "01"),
        ],
        None,
    );

    let response = send(app(state(&temp)), body, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejects_path_traversal() {
    let temp = TempLayout::new();
    let body = multipart_body(
        &[
            ("model", "arome"),
            ("run", runs::CURRENT),
            ("layer", "../../etc"),
            ("hour", "01"),
        ],
        Some(("x_cog.tif", &b"cog"[..])),
    );

    let response = send(app(state(&temp)), body, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(TempLayout::list(&temp.staging()).is_empty());
}

#[tokio::test]
async fn test_rejects_underscored_model() {
    let temp = TempLayout::new();
    let body = multipart_body(
        &[
            ("model", "arome_x"),
            ("run", runs::CURRENT),
            ("layer", "temperature"),
            ("hour", "01"),
        ],
        Some(("x_cog.tif", &b"cog"[..])),
    );

    let response = send(app(state(&temp)), body, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(TempLayout::list(&temp.staging()).is_empty());
}

// ============================================================================
// Staging and promotion
// ============================================================================

#[tokio::test]
async fn test_upload_is_staged_until_run_complete() {
    let temp = TempLayout::new();
    let current = artifact(runs::CURRENT, "temperature", "01");

    let response = upload(app(state(&temp)), &current, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["file"], current.file_name());
    assert_eq!(body["promoted"], false);
    assert_eq!(TempLayout::list(&temp.staging()), vec![current.file_name()]);
    assert!(TempLayout::list(&temp.storage()).is_empty());
}

#[tokio::test]
async fn test_complete_run_is_promoted() {
    let temp = TempLayout::new();
    let old = artifact(runs::PREVIOUS, "temperature", "01");
    temp.write(&format!("storage/{}", old.file_name()), b"old");
    let state = state(&temp);

    // 2 hours x 2 layers
    let uploads = [
        artifact(runs::CURRENT, "temperature", "01"),
        artifact(runs::CURRENT, "temperature", "02"),
        artifact(runs::CURRENT, "humidity", "01"),
        artifact(runs::CURRENT, "humidity", "02"),
    ];
    let mut promoted = Vec::new();
    for current in &uploads {
        let response = upload(app(state.clone()), current, Some(SECRET)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        promoted.push(body_json(response).await["promoted"].as_bool().unwrap());
    }

    assert_eq!(promoted, vec![false, false, false, true]);
    let mut expected: Vec<String> = uploads.iter().map(|a| a.file_name()).collect();
    expected.sort();
    assert_eq!(TempLayout::list(&temp.storage()), expected);
    assert!(TempLayout::list(&temp.staging()).is_empty());

    let metadata = app(state)
        .oneshot(
            Request::builder()
                .uri("/metadata.json?model=arome")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(metadata).await["run_hour"], runs::CURRENT);
}

#[tokio::test]
async fn test_vector_upload_keeps_its_format() {
    let temp = TempLayout::new();
    let vector = ProcessedArtifact::new("arome", runs::CURRENT, "humidity", "01", ArtifactFormat::Vector);

    let response = upload(app(state(&temp)), &vector, Some(SECRET)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(TempLayout::list(&temp.staging()), vec![vector.file_name()]);
}
