//! Configuration loader for the `greenfield-sensorflow` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Components receive the values they need at
//! construction; nothing re-reads the environment mid-session.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::controller::DEFAULT_WINDOW_SIZE;
use crate::ingestion::{LiveConfig, DEFAULT_MOCK_INTERVAL};
use crate::providers::RuleThresholds;

/// Parse an optional typed variable with a default value.
macro_rules! parse_var {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string variable.
macro_rules! require_var {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Which ingestion port the service runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Synthetic samples on a fixed cadence.
    Mock { interval: Duration },
    /// Live WebSocket stream.
    Live(LiveConfig),
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Inference endpoint base URL.
    pub inference_url: String,

    /// Bearer token attached to predict calls.
    pub inference_token: Option<String>,

    pub source: SourceConfig,

    /// Sliding window capacity.
    pub window_size: usize,

    /// Dashboard API port.
    pub http_port: u16,

    pub thresholds: RuleThresholds,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `INFERENCE_API_URL` – inference endpoint base URL
/// - `INGESTION_WS_URL` – streaming endpoint, only when `INGESTION_SOURCE=ws`
///
/// Optional:
/// - `INFERENCE_API_TOKEN` – bearer token for predict calls
/// - `INGESTION_SOURCE` – `mock` or `ws` (default: mock)
/// - `STREAM_RECONNECT_ATTEMPTS` – bounded reconnects (default: 5)
/// - `STREAM_RECONNECT_DELAY_MS` – base reconnect delay (default: 1000)
/// - `MOCK_INTERVAL_MS` – synthetic cadence (default: 1200)
/// - `WINDOW_SIZE` – sliding window capacity (default: 50)
/// - `HTTP_PORT` – dashboard API port (default: 8080)
/// - `RULE_N_MIN`, `RULE_P_MIN`, `RULE_K_MIN`, `RULE_TEMP_MIN`, `RULE_TEMP_MAX`
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|key| env::var(key).ok())
}

/// Same as [`load_from_env`] over an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let inference_url = require_var!(lookup, "INFERENCE_API_URL");
    let inference_token = lookup("INFERENCE_API_TOKEN").filter(|t| !t.trim().is_empty());

    let source = match lookup("INGESTION_SOURCE").as_deref().map(str::trim) {
        None | Some("") | Some("mock") => {
            let interval_ms = parse_var!(
                lookup,
                "MOCK_INTERVAL_MS",
                u64,
                DEFAULT_MOCK_INTERVAL.as_millis() as u64
            );
            if interval_ms == 0 {
                bail!("Invalid MOCK_INTERVAL_MS: must be greater than 0");
            }
            SourceConfig::Mock {
                interval: Duration::from_millis(interval_ms),
            }
        }
        Some("ws") => {
            let defaults = LiveConfig::new(require_var!(lookup, "INGESTION_WS_URL"));
            SourceConfig::Live(LiveConfig {
                max_reconnect_attempts: parse_var!(
                    lookup,
                    "STREAM_RECONNECT_ATTEMPTS",
                    u32,
                    defaults.max_reconnect_attempts
                ),
                reconnect_delay: Duration::from_millis(parse_var!(
                    lookup,
                    "STREAM_RECONNECT_DELAY_MS",
                    u64,
                    defaults.reconnect_delay.as_millis() as u64
                )),
                ..defaults
            })
        }
        Some(other) => bail!("Invalid INGESTION_SOURCE: '{}' (expected mock or ws)", other),
    };

    let window_size = parse_var!(lookup, "WINDOW_SIZE", usize, DEFAULT_WINDOW_SIZE);
    let http_port = parse_var!(lookup, "HTTP_PORT", u16, 8080);

    let d = RuleThresholds::default();
    let thresholds = RuleThresholds {
        nitrogen_min_mg_kg: parse_var!(lookup, "RULE_N_MIN", f64, d.nitrogen_min_mg_kg),
        phosphorus_min_mg_kg: parse_var!(lookup, "RULE_P_MIN", f64, d.phosphorus_min_mg_kg),
        potassium_min_mg_kg: parse_var!(lookup, "RULE_K_MIN", f64, d.potassium_min_mg_kg),
        temp_min_c: parse_var!(lookup, "RULE_TEMP_MIN", f64, d.temp_min_c),
        temp_max_c: parse_var!(lookup, "RULE_TEMP_MAX", f64, d.temp_max_c),
    };
    if thresholds.temp_min_c > thresholds.temp_max_c {
        bail!(
            "RULE_TEMP_MIN ({}) must not exceed RULE_TEMP_MAX ({})",
            thresholds.temp_min_c,
            thresholds.temp_max_c
        );
    }

    Ok(Config {
        inference_url,
        inference_token,
        source,
        window_size,
        http_port,
        thresholds,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the inference token while showing all other values that
    /// were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.inference_token {
            Some(_) => "****",
            None => "(none)",
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  INFERENCE_API_URL   : {}", self.inference_url);
        tracing::info!("  INFERENCE_API_TOKEN : {}", masked_token);
        match &self.source {
            SourceConfig::Mock { interval } => {
                tracing::info!("  INGESTION_SOURCE    : mock");
                tracing::info!("  MOCK_INTERVAL_MS    : {}", interval.as_millis());
            }
            SourceConfig::Live(live) => {
                tracing::info!("  INGESTION_SOURCE    : ws");
                tracing::info!("  INGESTION_WS_URL    : {}", live.url);
                tracing::info!("  RECONNECT_ATTEMPTS  : {}", live.max_reconnect_attempts);
                tracing::info!("  RECONNECT_DELAY_MS  : {}", live.reconnect_delay.as_millis());
            }
        }
        tracing::info!("  WINDOW_SIZE         : {}", self.window_size);
        tracing::info!("  HTTP_PORT           : {}", self.http_port);
        tracing::info!("  RULE THRESHOLDS     : {:?}", self.thresholds);
    }
}
