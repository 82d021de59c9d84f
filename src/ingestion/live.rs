//! Live source: persistent WebSocket stream with bounded reconnection.
//!
//! `Disconnected -> Connecting -> Connected`, back to `Disconnected` on loss.
//! The socket counts as connected once the namespace join is acknowledged.
//! After `max_reconnect_attempts` consecutive failures the source gives up
//! and stays disconnected with `last_error` set; an explicit `start` (or a
//! fresh first subscriber) tries again.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::frame::{self, Frame};
use super::{
    now_ms, AdvisoryCallback, Channel, ConnectionState, IngestionPort, PortStatus, Release,
    SampleCallback, SubscriberRegistry, Subscription,
};
use crate::error::TransportError;
use crate::models::{AdvisoryPair, SensorSample};
use crate::normalize::normalize_value;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Connection settings, fixed for the lifetime of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    pub url: String,
    pub max_reconnect_attempts: u32,
    /// Base delay; attempt `n` waits `n * reconnect_delay`.
    pub reconnect_delay: Duration,
}

impl LiveConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub struct LiveSource {
    inner: Arc<Inner>,
}

struct Inner {
    config: LiveConfig,
    status: PortStatus,
    samples: SubscriberRegistry<SensorSample>,
    advisories: SubscriberRegistry<AdvisoryPair>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSource {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                status: PortStatus::default(),
                samples: SubscriberRegistry::new(),
                advisories: SubscriberRegistry::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Whether a connection task is alive (connecting, connected or
    /// waiting to reconnect).
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        self.inner.stop_locked(&mut self.inner.task.lock());
    }
}

impl Inner {
    fn start_locked(self: &Arc<Self>, task: &mut Option<JoinHandle<()>>) {
        // ---
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let epoch = self.status.begin();
        let Ok(runtime) = Handle::try_current() else {
            self.status.record_error(epoch, "ws", &TransportError::NoRuntime);
            *task = None;
            return;
        };
        info!(url = %self.config.url, "live source started");
        *task = Some(runtime.spawn(Arc::clone(self).run(epoch)));
    }

    fn stop_locked(&self, task: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = task.take() {
            handle.abort();
            info!(url = %self.config.url, "live source stopped");
        }
        self.status.end();
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        // ---
        let mut failures: u32 = 0;

        loop {
            self.status.set_state(epoch, ConnectionState::Connecting);

            let lost = match connect_async(self.config.url.as_str()).await {
                Ok((stream, _)) => {
                    debug!(url = %self.config.url, "websocket upgraded");
                    failures = 0;
                    self.session(stream, epoch).await
                }
                Err(e) => TransportError::Connect {
                    url: self.config.url.clone(),
                    reason: e.to_string(),
                },
            };

            self.status.set_state(epoch, ConnectionState::Disconnected);
            self.status.record_error(epoch, "ws", &lost);

            failures += 1;
            if failures > self.config.max_reconnect_attempts {
                let gave_up = TransportError::GaveUp {
                    attempts: self.config.max_reconnect_attempts,
                };
                self.status.record_error(epoch, "ws", &gave_up);
                return;
            }

            let delay = self.config.reconnect_delay * failures;
            debug!(attempt = failures, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    /// Pump one connection until it drops; returns why it dropped.
    ///
    /// The source counts as connected once the namespace join is
    /// acknowledged, or on the first event from publishers that skip the
    /// handshake.
    async fn session(&self, stream: WsStream, epoch: u64) -> TransportError {
        // ---
        let (mut sink, mut stream) = stream.split();
        let mut joined = false;

        while let Some(message) = stream.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return TransportError::Closed,
                Ok(_) => continue,
                Err(e) => return TransportError::Receive(e.to_string()),
            };

            let reply = match frame::decode(&text) {
                Frame::Open => Some(frame::NAMESPACE_CONNECT),
                Frame::Ping => Some(frame::PONG),
                Frame::Joined => {
                    self.mark_joined(epoch, &mut joined);
                    None
                }
                Frame::Event { name, data } => {
                    self.mark_joined(epoch, &mut joined);
                    self.route(epoch, &name, &data);
                    None
                }
                Frame::Disconnect(None) => return TransportError::Closed,
                Frame::Disconnect(Some(reason)) => {
                    return TransportError::Connect {
                        url: self.config.url.clone(),
                        reason,
                    }
                }
                Frame::Ignored => None,
                Frame::Invalid(reason) => {
                    debug!(%reason, "skipping undecodable frame");
                    None
                }
            };

            if let Some(reply) = reply {
                if let Err(e) = sink.send(Message::Text(reply.to_string())).await {
                    return TransportError::Receive(e.to_string());
                }
            }
        }

        TransportError::Closed
    }

    fn mark_joined(&self, epoch: u64, joined: &mut bool) {
        if !*joined {
            *joined = true;
            info!(url = %self.config.url, "stream connected");
            self.status.set_state(epoch, ConnectionState::Connected);
        }
    }

    fn route(&self, epoch: u64, event: &str, data: &Value) {
        // ---
        match event {
            "sensor" => {
                let sample = normalize_value(data, now_ms());
                if let Err(e) = self.samples.dispatch(&sample) {
                    self.status.record_error(epoch, "ws", &e);
                }
            }
            "advisory" | "ai_advice" => match AdvisoryPair::deserialize(data) {
                Ok(pair) => {
                    if let Err(e) = self.advisories.dispatch(&pair) {
                        self.status.record_error(epoch, "ws", &e);
                    }
                }
                Err(e) => warn!(error = %e, "advisory payload rejected"),
            },
            other => trace!(event = other, "ignoring event"),
        }
    }
}

impl Release for Inner {
    fn release(&self, id: Uuid, channel: Channel) {
        // ---
        match channel {
            Channel::Samples => {
                let mut task = self.task.lock();
                if self.samples.remove(id) == Some(0) {
                    self.stop_locked(&mut task);
                }
            }
            Channel::Advisories => {
                self.advisories.remove(id);
            }
        }
    }
}

impl IngestionPort for LiveSource {
    fn name(&self) -> &str {
        "ws"
    }

    fn subscribe(&self, callback: SampleCallback) -> Subscription {
        // ---
        let mut task = self.inner.task.lock();
        let (id, count) = self.inner.samples.insert(callback);
        if count == 1 {
            self.inner.start_locked(&mut task);
        }
        let owner: Weak<dyn Release> = Arc::downgrade(&self.inner) as Weak<dyn Release>;
        Subscription::new(id, Channel::Samples, owner)
    }

    fn on_advisory(&self, callback: AdvisoryCallback) -> Option<Subscription> {
        let (id, _) = self.inner.advisories.insert(callback);
        let owner: Weak<dyn Release> = Arc::downgrade(&self.inner) as Weak<dyn Release>;
        Some(Subscription::new(id, Channel::Advisories, owner))
    }

    fn start(&self) {
        self.inner.start_locked(&mut self.inner.task.lock());
    }

    fn stop(&self) {
        self.inner.stop_locked(&mut self.inner.task.lock());
    }

    fn state(&self) -> ConnectionState {
        self.inner.status.state()
    }

    fn last_error(&self) -> Option<String> {
        self.inner.status.last_error()
    }

    fn subscriber_count(&self) -> usize {
        self.inner.samples.len()
    }
}
