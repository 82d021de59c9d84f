//! Ingestion ports.
//!
//! A port owns one upstream feed and fans each normalized sample out to any
//! number of in-process subscribers. The upstream resource (timer or socket)
//! is held only while at least one sample subscriber exists: the first
//! [`IngestionPort::subscribe`] acquires it, dropping the last
//! [`Subscription`] releases it.
//!
//! Transport problems are reported through [`IngestionPort::state`] and
//! [`IngestionPort::last_error`]; nothing on this surface returns an error.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::TransportError;
use crate::models::{AdvisoryPair, SensorSample};

mod frame;
mod live;
mod registry;
mod synthetic;

pub use live::{LiveConfig, LiveSource, DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY};
pub use registry::{Callback, SubscriberRegistry};
pub use synthetic::{SyntheticSource, DEFAULT_INTERVAL as DEFAULT_MOCK_INTERVAL};

// ---

pub type SampleCallback = Callback<SensorSample>;
pub type AdvisoryCallback = Callback<AdvisoryPair>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Capability set shared by every ingestion source.
pub trait IngestionPort: Send + Sync {
    /// Short source name (`mock`, `ws`).
    fn name(&self) -> &str;

    /// Register a sample callback. The first active subscriber starts the
    /// upstream feed.
    ///
    /// The feed runs on the current Tokio runtime. Outside one the callback
    /// is still registered, but the feed is not started and `last_error`
    /// reports it; a later `start()` from inside a runtime picks it up.
    fn subscribe(&self, callback: SampleCallback) -> Subscription;

    /// Register for paired advisories pushed over the same feed. Sources
    /// without an advisory channel return `None`. Advisory subscribers do
    /// not keep the feed alive.
    fn on_advisory(&self, _callback: AdvisoryCallback) -> Option<Subscription> {
        None
    }

    /// Acquire the upstream resource. No-op when already running; restarts
    /// a feed that has ended on its own.
    fn start(&self);

    /// Release the upstream resource and clear connection state.
    fn stop(&self);

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn last_error(&self) -> Option<String>;

    fn subscriber_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Samples,
    Advisories,
}

/// Implemented by port internals so a [`Subscription`] can detach itself.
pub(crate) trait Release: Send + Sync {
    fn release(&self, id: Uuid, channel: Channel);
}

/// Handle returned by `subscribe`. Unsubscribes on [`Subscription::unsubscribe`]
/// or when dropped, whichever comes first.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Uuid,
    channel: Channel,
    owner: Option<Weak<dyn Release>>,
}

impl Subscription {
    pub(crate) fn new(id: Uuid, channel: Channel, owner: Weak<dyn Release>) -> Self {
        Self {
            id,
            channel,
            owner: Some(owner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        // ---
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.release(self.id, self.channel);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("attached", &self.owner.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    state: ConnectionState,
    last_error: Option<String>,
    epoch: u64,
}

/// Connection flag and last error of one port.
///
/// Every start opens a new epoch; updates carrying an older epoch come from
/// a feed that has already been stopped and are dropped.
#[derive(Debug, Default)]
pub(crate) struct PortStatus {
    inner: Mutex<StatusInner>,
}

impl PortStatus {
    pub(crate) fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.epoch
    }

    pub(crate) fn end(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.state = ConnectionState::Disconnected;
    }

    pub(crate) fn set_state(&self, epoch: u64, state: ConnectionState) {
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            inner.state = state;
        }
    }

    pub(crate) fn record_error(&self, epoch: u64, source: &str, err: &TransportError) {
        // ---
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            warn!(source, error = %err, "ingestion error");
            inner.last_error = Some(err.to_string());
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wrap a closure as a sample callback.
pub fn sample_callback<F>(f: F) -> SampleCallback
where
    F: Fn(&SensorSample) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an advisory callback.
pub fn advisory_callback<F>(f: F) -> AdvisoryCallback
where
    F: Fn(&AdvisoryPair) + Send + Sync + 'static,
{
    Arc::new(f)
}
