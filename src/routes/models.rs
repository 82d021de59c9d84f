use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get,
    routing::post, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::error::PredictError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/models", get(list))
        .route("/predict", post(predict))
}

/// Provider catalogue, in registry order.
async fn list(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.providers.infos())
}

/// Query parameters for `/predict`
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    model: String,
}

/// Run one provider over the controller's current sample and window.
async fn predict(
    Query(params): Query<PredictQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("POST /predict - model={}", params.model);

    let result = match state.providers.require(&params.model) {
        Ok(provider) => state.controller.predict_with(provider.as_ref()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Prediction with '{}' failed: {}", params.model, e);
            }
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

fn status_for(err: &PredictError) -> StatusCode {
    match err {
        PredictError::UnknownProvider(_) => StatusCode::NOT_FOUND,
        PredictError::NoSample => StatusCode::CONFLICT,
        PredictError::Request(_) | PredictError::Status { .. } | PredictError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}
