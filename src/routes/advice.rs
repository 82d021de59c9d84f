use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::models::Strategy;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/advice", get(handler))
}

/// Query parameters for `/advice`
#[derive(Debug, Deserialize)]
pub struct AdviceQuery {
    /// `rules` or `ai`; the controller's selection when absent.
    strategy: Option<String>,
}

/// Serve one half of the latest advisory pair. Reads local state only.
async fn handler(
    Query(params): Query<AdviceQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let strategy = match params.strategy.as_deref().map(str::parse::<Strategy>) {
        None => state.controller.strategy(),
        Some(Ok(strategy)) => strategy,
        Some(Err(e)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))).into_response();
        }
    };

    debug!("GET /advice - strategy={:?}", strategy);
    match state.controller.advice_for(strategy) {
        Some(advice) => (StatusCode::OK, Json(advice)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no advisory received yet" })),
        )
            .into_response(),
    }
}
