//! Application entry point for the `greenfield-sensorflow` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the configured ingestion port (synthetic or live stream)
//! - Activating the live data controller over that port
//! - Building the advisory provider registry
//! - Mounting all API routes via the `routes` gateway
//! - Serving until Ctrl-C, then releasing the ingestion port
//!
//! # Environment Variables
//! - `INFERENCE_API_URL` (**required**) – inference endpoint base URL
//! - `INGESTION_SOURCE` (optional) – `mock` or `ws` (default: `mock`)
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use greenfield_sensorflow::config::{self, SourceConfig};
use greenfield_sensorflow::controller::LiveDataController;
use greenfield_sensorflow::ingestion::{IngestionPort, LiveSource, SyntheticSource};
use greenfield_sensorflow::providers::{ProviderRegistry, RemoteModelProvider};
use greenfield_sensorflow::routes::{self, AppState};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let port: Arc<dyn IngestionPort> = match &cfg.source {
        SourceConfig::Mock { interval } => Arc::new(SyntheticSource::new(*interval)),
        SourceConfig::Live(live) => Arc::new(LiveSource::new(live.clone())),
    };

    let controller = Arc::new(LiveDataController::new(port, cfg.window_size));
    controller.activate();

    let mut remote = RemoteModelProvider::logistic_regression(&cfg.inference_url);
    if let Some(token) = &cfg.inference_token {
        remote = remote.with_bearer_token(token.clone());
    }
    let providers = ProviderRegistry::standard(cfg.thresholds, remote);
    tracing::info!("Advisory providers: {:?}", providers);

    // Build app from routes gateway
    let app: Router = routes::router(AppState::new(controller.clone(), providers));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.deactivate();
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    tracing::info!("Ctrl-C received, shutting down");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : ENTER, EXIT and CLOSE events with timing
///   - `"enter_exit"` : ENTER and EXIT only
///   - unset or other values: CLOSE events only
/// - Log level from `RUST_LOG`, else `AXUM_LOG_LEVEL` (default `debug`)
///
/// Call once at startup, before any tracing macro fires.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
            _ => "debug".to_string(),
        };
        EnvFilter::new(format!(
            "{level},hyper=info,reqwest=info,tungstenite=info,tokio_tungstenite=info"
        ))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
