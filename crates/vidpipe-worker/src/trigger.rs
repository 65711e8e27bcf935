//! HTTP trigger endpoint.
//!
//! The storage trigger posts one object-finalize event per request. Each
//! request runs a full invocation and answers `204 No Content` whatever the
//! outcome, so the trigger never redelivers because of a pipeline failure.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use vidpipe_models::{ObjectFinalizedEvent, SourceObject};

use crate::pipeline::Pipeline;

/// Upper bound on an event body; object resources are a few KiB.
pub const MAX_EVENT_BYTES: usize = 256 * 1024;

/// Shared state of the trigger server.
#[derive(Clone)]
pub struct TriggerState {
    pipeline: Pipeline,
    metrics: Option<PrometheusHandle>,
}

impl TriggerState {
    pub fn new(pipeline: Pipeline, metrics: Option<PrometheusHandle>) -> Self {
        Self { pipeline, metrics }
    }
}

/// Build the trigger router.
pub fn router(state: TriggerState) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run one invocation for the posted event.
///
/// The invocation is spawned so it completes (and cleans up) even if the
/// caller disconnects mid-request.
async fn handle_event(
    State(state): State<TriggerState>,
    Json(event): Json<ObjectFinalizedEvent>,
) -> StatusCode {
    let source = SourceObject::from(event);
    let pipeline = state.pipeline.clone();

    let invocation = tokio::spawn(async move { pipeline.handle(&source).await });
    if let Err(e) = invocation.await {
        error!("Invocation task aborted: {}", e);
    }

    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn render_metrics(State(state): State<TriggerState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
