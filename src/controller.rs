//! Live data controller.
//!
//! Binds one ingestion port to one sliding window, keeps the latest sample,
//! and holds the most recent advisory pair pushed from upstream. Switching
//! the displayed strategy only changes which half of that pair is read.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PredictError;
use crate::ingestion::{
    advisory_callback, sample_callback, ConnectionState, IngestionPort, Subscription,
};
use crate::models::{AdviceDetails, AdvisoryPair, Prediction, PredictionInput, SensorSample, Strategy};
use crate::providers::AdvisoryProvider;
use crate::window::SlidingWindow;

// ---

pub const DEFAULT_WINDOW_SIZE: usize = 50;

struct LiveState {
    latest: Option<SensorSample>,
    window: SlidingWindow,
    advisory: Option<AdvisoryPair>,
    strategy: Strategy,
}

/// Point-in-time view for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub source: String,
    pub state: ConnectionState,
    pub connected: bool,
    pub last_error: Option<String>,
    pub latest: Option<SensorSample>,
    pub series: Vec<SensorSample>,
}

/// One half of the current advisory pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedAdvice {
    pub ts: i64,
    pub strategy: Strategy,
    pub advice: AdviceDetails,
}

pub struct LiveDataController {
    port: Arc<dyn IngestionPort>,
    state: Arc<Mutex<LiveState>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl LiveDataController {
    pub fn new(port: Arc<dyn IngestionPort>, window_size: usize) -> Self {
        Self {
            port,
            state: Arc::new(Mutex::new(LiveState {
                latest: None,
                window: SlidingWindow::new(window_size),
                advisory: None,
                strategy: Strategy::default(),
            })),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn port(&self) -> &Arc<dyn IngestionPort> {
        &self.port
    }

    /// Subscribe to the port. Calling twice is a no-op.
    pub fn activate(&self) {
        // ---
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        subscriptions.push(self.port.subscribe(sample_callback(move |sample| {
            let mut state = state.lock();
            state.latest = Some(*sample);
            state.window.append(*sample);
        })));

        let state = Arc::clone(&self.state);
        if let Some(sub) = self.port.on_advisory(advisory_callback(move |pair| {
            state.lock().advisory = Some(pair.clone());
        })) {
            subscriptions.push(sub);
        }

        info!(source = self.port.name(), "live data controller activated");
    }

    /// Drop our subscriptions; the port stops if nobody else listens.
    pub fn deactivate(&self) {
        // ---
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        if subscriptions.is_empty() {
            return;
        }
        drop(subscriptions);
        info!(source = self.port.name(), "live data controller deactivated");
    }

    pub fn is_active(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }

    /// Accept an advisory pair computed upstream.
    pub fn push_advisory(&self, pair: AdvisoryPair) {
        debug!(ts = pair.ts, "advisory pair received");
        self.state.lock().advisory = Some(pair);
    }

    pub fn latest(&self) -> Option<SensorSample> {
        self.state.lock().latest
    }

    pub fn series(&self) -> Vec<SensorSample> {
        self.state.lock().window.snapshot()
    }

    pub fn advisory(&self) -> Option<AdvisoryPair> {
        self.state.lock().advisory.clone()
    }

    pub fn strategy(&self) -> Strategy {
        self.state.lock().strategy
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        self.state.lock().strategy = strategy;
    }

    /// The half of the current pair selected by [`LiveDataController::set_strategy`].
    pub fn current_advice(&self) -> Option<SelectedAdvice> {
        let state = self.state.lock();
        select(state.advisory.as_ref(), state.strategy)
    }

    pub fn advice_for(&self, strategy: Strategy) -> Option<SelectedAdvice> {
        select(self.state.lock().advisory.as_ref(), strategy)
    }

    /// Latest sample plus the window as context, if anything arrived yet.
    pub fn prediction_input(&self) -> Option<PredictionInput> {
        let state = self.state.lock();
        state
            .latest
            .map(|current| PredictionInput::new(current).with_window(state.window.snapshot()))
    }

    /// Run `provider` over the current data. Failures are returned as-is;
    /// there is no fallback to another provider.
    pub async fn predict_with(
        &self,
        provider: &dyn AdvisoryProvider,
    ) -> Result<Prediction, PredictError> {
        // ---
        let input = self.prediction_input().ok_or(PredictError::NoSample)?;
        provider.predict(&input).await
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        // ---
        let (latest, series) = {
            let state = self.state.lock();
            (state.latest, state.window.snapshot())
        };
        let state = self.port.state();

        LiveSnapshot {
            source: self.port.name().to_string(),
            state,
            connected: state == ConnectionState::Connected,
            last_error: self.port.last_error(),
            latest,
            series,
        }
    }
}

impl Drop for LiveDataController {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn select(pair: Option<&AdvisoryPair>, strategy: Strategy) -> Option<SelectedAdvice> {
    pair.map(|pair| SelectedAdvice {
        ts: pair.ts,
        strategy,
        advice: pair.half(strategy).clone(),
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ingestion::{
        AdvisoryCallback, Channel, Release, SampleCallback, SubscriberRegistry,
    };
    use crate::models::{EnergyAdvice, IrrigationAdvice};
    use crate::normalize::normalize;
    use crate::providers::RuleBasedProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    /// Hand-driven port that counts acquisitions.
    #[derive(Default)]
    struct FakeInner {
        samples: SubscriberRegistry<SensorSample>,
        advisories: SubscriberRegistry<AdvisoryPair>,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl Release for FakeInner {
        fn release(&self, id: Uuid, channel: Channel) {
            match channel {
                Channel::Samples => {
                    if self.samples.remove(id) == Some(0) {
                        self.stops.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Channel::Advisories => {
                    self.advisories.remove(id);
                }
            }
        }
    }

    #[derive(Default)]
    struct FakePort {
        inner: Arc<FakeInner>,
    }

    impl FakePort {
        fn emit(&self, ts: i64, soil: f64) {
            let mut map = serde_json::Map::new();
            map.insert("soilMoisture".into(), soil.into());
            self.inner.samples.dispatch(&normalize(&map, ts)).unwrap();
        }

        fn push(&self, pair: &AdvisoryPair) {
            self.inner.advisories.dispatch(pair).unwrap();
        }
    }

    impl IngestionPort for FakePort {
        fn name(&self) -> &str {
            "fake"
        }

        fn subscribe(&self, callback: SampleCallback) -> Subscription {
            let (id, count) = self.inner.samples.insert(callback);
            if count == 1 {
                self.inner.starts.fetch_add(1, Ordering::SeqCst);
            }
            let owner: Weak<dyn Release> = Arc::downgrade(&self.inner) as Weak<dyn Release>;
            Subscription::new(id, Channel::Samples, owner)
        }

        fn on_advisory(&self, callback: AdvisoryCallback) -> Option<Subscription> {
            let (id, _) = self.inner.advisories.insert(callback);
            let owner: Weak<dyn Release> = Arc::downgrade(&self.inner) as Weak<dyn Release>;
            Some(Subscription::new(id, Channel::Advisories, owner))
        }

        fn start(&self) {}

        fn stop(&self) {}

        fn state(&self) -> ConnectionState {
            if self.inner.samples.is_empty() {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Connected
            }
        }

        fn last_error(&self) -> Option<String> {
            None
        }

        fn subscriber_count(&self) -> usize {
            self.inner.samples.len()
        }
    }

    fn pair(ts: i64) -> AdvisoryPair {
        AdvisoryPair {
            ts,
            rules: AdviceDetails {
                irrigation: IrrigationAdvice {
                    status: "ON".into(),
                    reason: "Soglia attiva: < 40%".into(),
                    confidence: None,
                },
                ..AdviceDetails::default()
            },
            ai: AdviceDetails {
                irrigation: IrrigationAdvice {
                    status: "OFF".into(),
                    reason: "AI (LogReg)".into(),
                    confidence: Some(0.7),
                },
                energy: EnergyAdvice {
                    status: "ACTIVE".into(),
                    reason: "AI (LogReg)".into(),
                },
                ..AdviceDetails::default()
            },
        }
    }

    #[test]
    fn test_samples_update_latest_and_window() {
        // ---
        let port = Arc::new(FakePort::default());
        let controller = LiveDataController::new(port.clone(), 3);
        controller.activate();

        for ts in 1..=5 {
            port.emit(ts, 20.0 + ts as f64);
        }

        assert_eq!(controller.latest().map(|s| s.ts), Some(5));
        let ts: Vec<i64> = controller.series().iter().map(|s| s.ts).collect();
        assert_eq!(ts, vec![3, 4, 5]);

        let snap = controller.snapshot();
        assert_eq!(snap.source, "fake");
        assert!(snap.connected);
        assert_eq!(snap.series.len(), 3);
    }

    #[test]
    fn test_activate_and_deactivate_drive_port_demand() {
        // ---
        let port = Arc::new(FakePort::default());
        let controller = LiveDataController::new(port.clone(), 10);

        controller.activate();
        controller.activate();
        assert!(controller.is_active());
        assert_eq!(port.subscriber_count(), 1);
        assert_eq!(port.inner.starts.load(Ordering::SeqCst), 1);

        controller.deactivate();
        assert!(!controller.is_active());
        assert_eq!(port.subscriber_count(), 0);
        assert_eq!(port.inner.stops.load(Ordering::SeqCst), 1);
        assert!(port.inner.advisories.is_empty());

        // Deliveries after deactivation are not recorded
        port.emit(9, 10.0);
        assert!(controller.latest().is_none());
    }

    #[test]
    fn test_shared_port_outlives_one_consumer() {
        // ---
        let port = Arc::new(FakePort::default());
        let charts = LiveDataController::new(port.clone(), 10);
        let kpis = LiveDataController::new(port.clone(), 10);

        charts.activate();
        kpis.activate();
        assert_eq!(port.inner.starts.load(Ordering::SeqCst), 1);

        drop(charts);
        assert_eq!(port.inner.stops.load(Ordering::SeqCst), 0);

        port.emit(1, 30.0);
        assert_eq!(kpis.latest().map(|s| s.ts), Some(1));

        kpis.deactivate();
        assert_eq!(port.inner.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strategy_toggle_reads_same_pair() {
        // ---
        let port = Arc::new(FakePort::default());
        let controller = LiveDataController::new(port.clone(), 10);
        controller.activate();
        assert!(controller.current_advice().is_none());

        port.push(&pair(1_700));
        let subscribers_before = port.subscriber_count();

        let rules = controller.current_advice().unwrap();
        assert_eq!(rules.strategy, Strategy::Rules);
        assert_eq!(rules.advice.irrigation.status, "ON");

        controller.set_strategy(Strategy::Model);
        let model = controller.current_advice().unwrap();
        assert_eq!(model.advice.irrigation.status, "OFF");
        assert_eq!(model.advice.energy.status, "ACTIVE");
        assert_eq!(model.ts, rules.ts);

        controller.set_strategy(Strategy::Rules);
        assert_eq!(controller.current_advice().unwrap(), rules);

        // Toggling touched neither the port nor the stored pair
        assert_eq!(port.subscriber_count(), subscribers_before);
        assert_eq!(port.inner.starts.load(Ordering::SeqCst), 1);
        assert_eq!(controller.advisory(), Some(pair(1_700)));
    }

    #[test]
    fn test_push_advisory_replaces_pair() {
        // ---
        let controller = LiveDataController::new(Arc::new(FakePort::default()), 10);
        controller.push_advisory(pair(1));
        controller.push_advisory(pair(2));

        assert_eq!(controller.advice_for(Strategy::Model).map(|a| a.ts), Some(2));
    }

    #[tokio::test]
    async fn test_predict_with_uses_latest_and_window() {
        // ---
        let port = Arc::new(FakePort::default());
        let controller = LiveDataController::new(port.clone(), 10);
        let provider = RuleBasedProvider::default();

        let err = assert_err!(controller.predict_with(&provider).await);
        assert!(matches!(err, PredictError::NoSample));

        controller.activate();
        port.emit(1, 55.0);
        port.emit(2, 12.0);

        let input = controller.prediction_input().unwrap();
        assert_eq!(input.current.ts, 2);
        assert_eq!(input.window.as_ref().map(Vec::len), Some(2));

        let prediction = assert_ok!(controller.predict_with(&provider).await);
        assert_eq!(prediction.model_id, "rules");
        assert!(prediction.rationale.unwrap().contains("Soil=12%"));
    }
}
