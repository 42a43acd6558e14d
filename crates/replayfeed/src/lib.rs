// Feed server - HTTP front for the snapshot acquisition pipeline
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Filtered recording catalog and reassembled snapshot endpoints
// - Gzip response compression
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use replayfeed_client::{build_pipeline, ReqwestHttpClient, SnapshotPipeline};
use replayfeed_config::RuntimeConfig;
use replayfeed_core::{FeedError, RecordingFilter};
use serde_json::{json, Value};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod handlers;
mod init;

pub mod commands;
pub mod credentials;
pub mod export;

use handlers::{handle_recordings, handle_snapshots, health_check, ready_check};
pub use init::init_tracing;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SnapshotPipeline<ReqwestHttpClient>,
    pub filter: RecordingFilter,
    pub max_payload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let pipeline = build_pipeline(
            &config.upstream.base_url,
            config.upstream.timeout(),
            config.upstream.list_page_size,
            config.snapshot.batch_size,
        )
        .context("Failed to build upstream client")?;

        Ok(Self {
            pipeline,
            filter: recording_filter(config),
            max_payload_bytes: config.request.max_payload_bytes,
        })
    }
}

/// Watchability thresholds from the feed section.
pub fn recording_filter(config: &RuntimeConfig) -> RecordingFilter {
    RecordingFilter {
        min_duration_secs: config.feed.min_duration_secs,
        min_interactions: config.feed.min_interactions,
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), "Request error: {:?}", self.error);
        } else {
            warn!(status = self.status.as_u16(), "Request rejected: {}", self.error);
        }

        let mut body = json!({ "error": self.error.to_string() });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self {
            status,
            error,
            details: None,
        }
    }

    pub fn bad_request<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::with_status(StatusCode::BAD_REQUEST, error.into())
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let details = err.details().cloned();
        Self {
            status,
            error: err.into(),
            details,
        }
    }
}

/// Routes with tracing and response compression.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/recordings", post(handle_recordings))
        .route("/api/recordings/:id/snapshots", post(handle_snapshots))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new().gzip(true)),
        )
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point for server mode with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    let addr = config.server.listen_addr.clone();
    let state = AppState::from_config(&config)?;

    info!(
        upstream = %config.upstream.base_url,
        batch_size = config.snapshot.batch_size,
        max_payload_bytes = state.max_payload_bytes,
        "Feed server configured"
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Feed server listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/api/recordings                - Filtered recordings", addr);
    info!("  POST http://{}/api/recordings/:id/snapshots  - Reassembled events", addr);
    info!("  GET  http://{}/health                        - Health check", addr);
    info!("  GET  http://{}/ready                         - Readiness check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
