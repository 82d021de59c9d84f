//! Crop telemetry ingestion and advisory pipeline.
//!
//! Raw sensor payloads (synthetic or streamed over a WebSocket) are
//! normalized into [`SensorSample`]s, fanned out to subscribers, kept in a
//! bounded sliding window, and fed to pluggable advisory providers.
//!
//! Module boundaries:
//! - `normalize` turns loosely keyed payloads into canonical samples
//! - `ingestion` owns the upstream feeds and subscriber fan-out
//! - `window` keeps the most recent samples in arrival order
//! - `providers` holds the prediction strategies and their registry
//! - `controller` binds one port to one window for the presentation layer
//! - `routes` exposes the controller and registry over HTTP
//! - `config` loads the runtime configuration

pub mod config;
pub mod controller;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod routes;
pub mod window;

pub use config::Config;
pub use controller::{LiveDataController, LiveSnapshot, SelectedAdvice};
pub use error::{PredictError, TransportError};
pub use ingestion::{ConnectionState, IngestionPort, LiveSource, Subscription, SyntheticSource};
pub use models::{AdvisoryPair, CropStage, Decision, Prediction, PredictionInput, SensorSample, Strategy};
pub use providers::{AdvisoryProvider, ProviderRegistry, RemoteModelProvider, RuleBasedProvider};
pub use window::SlidingWindow;
