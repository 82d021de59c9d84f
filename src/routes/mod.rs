//! Dashboard API gateway.
//!
//! Each sibling module exports a subrouter over [`AppState`]; this gateway
//! merges them so `main.rs` never needs to know about individual endpoints.

use std::sync::Arc;

use axum::Router;

use crate::controller::LiveDataController;
use crate::providers::ProviderRegistry;

mod advice;
mod health;
mod live;
mod models;

// ---

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<LiveDataController>,
    pub providers: ProviderRegistry,
}

impl AppState {
    pub fn new(controller: Arc<LiveDataController>, providers: ProviderRegistry) -> Self {
        Self {
            controller,
            providers,
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(live::router())
        .merge(advice::router())
        .merge(models::router())
        .with_state(state)
}
