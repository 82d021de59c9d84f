//! Error types for the pipeline.
//!
//! Transport errors are never returned from the ingestion ports; they are
//! rendered into the port's `last_error`. Predict errors propagate to the
//! caller of that one prediction.

use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("stream receive failed: {0}")]
    Receive(String),

    #[error("stream closed by peer")]
    Closed,

    #[error("gave up after {attempts} reconnect attempts")]
    GaveUp { attempts: u32 },

    #[error("subscriber panicked: {0}")]
    SubscriberPanicked(String),

    #[error("no tokio runtime to drive the feed; call start() from within one")]
    NoRuntime,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference endpoint for '{provider}' returned {status}")]
    Status {
        provider: String,
        status: reqwest::StatusCode,
    },

    #[error("inference response could not be decoded: {0}")]
    Decode(String),

    #[error("no advisory provider with id '{0}'")]
    UnknownProvider(String),

    #[error("no sensor sample received yet")]
    NoSample,
}
