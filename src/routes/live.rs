use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

use super::AppState;
use crate::controller::LiveSnapshot;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/live", get(handler))
}

/// Latest sample, windowed series and connection status.
async fn handler(State(state): State<AppState>) -> Json<LiveSnapshot> {
    // ---
    let snapshot = state.controller.snapshot();
    debug!(
        "GET /live - {} samples, connected={}",
        snapshot.series.len(),
        snapshot.connected
    );
    Json(snapshot)
}
