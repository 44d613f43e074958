use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trail::TrailReport;
use vision::CacheStats;

use crate::Pipeline;
use crate::config::{AppConfig, OperationMode};
use crate::metrics::MetricsSnapshot;

const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    mode: OperationMode,
}

#[derive(Deserialize)]
struct TrailRequest {
    path: String,
}

#[derive(Serialize)]
struct StatsResponse {
    metrics: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheStats>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", post(health_check))
        .route("/health", get(health_check))
        .route("/trail", post(trail_from_folder))
        .route("/trail/upload", post(trail_from_upload))
        .route("/stats", get(get_stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.pipeline.model_id().to_string(),
        mode: state.config.mode,
    })
}

async fn trail_from_folder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrailRequest>,
) -> Result<Json<TrailReport>, ApiError> {
    let dir = PathBuf::from(&req.path);

    let report = state
        .pipeline
        .run_dir(&dir, CancellationToken::new())
        .await
        .map_err(bad_request)?;

    Ok(Json(report))
}

/// Every multipart field is one image, named by its file name.
async fn trail_from_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TrailReport>, ApiError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field
            .file_name()
            .or(field.name())
            .unwrap_or_default()
            .to_string();
        let bytes = field.bytes().await.map_err(bad_request)?;
        uploads.push((name, bytes.to_vec()));
    }

    let images = ingest::ingest_uploads(uploads).map_err(bad_request)?;
    let report = state
        .pipeline
        .run(images, CancellationToken::new())
        .await
        .map_err(bad_request)?;

    Ok(Json(report))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.pipeline.metrics(),
        cache: state.pipeline.cache_stats(),
    })
}
