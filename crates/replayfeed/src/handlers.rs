// HTTP request handlers
//
// Recording catalog, snapshot reassembly and health endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::{counter, histogram};
use replayfeed_client::list_watchable;
use replayfeed_core::{Credentials, FeedError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

use crate::{AppError, AppState};

/// Body of `POST /api/recordings`
#[derive(Debug, Deserialize)]
struct RecordingsRequest {
    #[serde(flatten)]
    credentials: Credentials,
    #[serde(default)]
    offset: Option<usize>,
}

/// POST /api/recordings - Filtered recording catalog
pub(crate) async fn handle_recordings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    counter!("replayfeed.requests.recordings", 1);
    let request: RecordingsRequest = parse_body(&state, &body)?;
    let credentials = request.credentials.validated()?;

    let page = list_watchable(
        state.pipeline.api(),
        &credentials,
        request.offset,
        &state.filter,
    )
    .await?;

    debug!(count = page.count, offset = ?request.offset, "Returning recordings");
    Ok(Json(page))
}

/// POST /api/recordings/:id/snapshots - Reassembled event stream of one recording
pub(crate) async fn handle_snapshots(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    counter!("replayfeed.requests.snapshots", 1);

    let credentials: Credentials = parse_body(&state, &body)?;
    let credentials = credentials.validated()?;

    let stream = state
        .pipeline
        .fetch_event_stream(&credentials, &recording_id)
        .await?;

    if stream.is_empty() {
        return Err(FeedError::EmptySnapshot { recording_id }.into());
    }

    histogram!(
        "replayfeed.snapshots.latency_ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    info!(
        recording_id = %recording_id,
        events = stream.len(),
        "Serving reassembled recording"
    );
    Ok(Json(json!({ "sources": stream })))
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// GET /ready - Readiness check
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "upstream": state.pipeline.api().base_url(),
        })),
    )
}

fn parse_body<T: DeserializeOwned>(state: &AppState, body: &Bytes) -> Result<T, AppError> {
    let max_payload = state.max_payload_bytes;
    if body.len() > max_payload {
        counter!("replayfeed.requests.rejected", 1);
        return Err(AppError::with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            anyhow::anyhow!("payload {} exceeds limit {}", body.len(), max_payload),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("invalid request body: {}", e)))
}
