//! Liveness, health, and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use serde::Serialize;
use tormeta_telemetry::build_sha;
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct PingResponse {
    pub(crate) message: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) build: &'static str,
    pub(crate) database: &'static str,
    pub(crate) live_subscribers: usize,
    pub(crate) daemon_consecutive_failures: i64,
}

pub(crate) async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}

/// Report store reachability and live-feed state; degraded storage yields 503.
pub(crate) async fn health(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    if let Err(err) = state.store.list_recent(1).await {
        warn!(error = %err, "health check failed to reach the torrent store");
        return Err(ApiError::service_unavailable("database unavailable"));
    }
    let snapshot = state.telemetry.snapshot();
    Ok(Json(HealthResponse {
        status: "ok",
        build: build_sha(),
        database: "ok",
        live_subscribers: state.registry.len(),
        daemon_consecutive_failures: snapshot.consecutive_failures,
    }))
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
