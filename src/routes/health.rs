// src/routes/health.rs
//! API health check endpoint for the dashboard backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running. Besides the
//! static `status`, it reports the ingestion source and whether it is
//! currently connected, read from the port's status surface without
//! touching the transport.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::ingestion::ConnectionState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    source: String,
    ingestion: ConnectionState,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let port = state.controller.port();
    Json(HealthResponse {
        status: "ok",
        source: port.name().to_string(),
        ingestion: port.state(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
