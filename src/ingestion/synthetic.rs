//! Synthetic source: plausible readings on a fixed cadence, no network.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    now_ms, Channel, ConnectionState, IngestionPort, PortStatus, Release, SampleCallback,
    SubscriberRegistry, Subscription,
};
use crate::error::TransportError;
use crate::models::{CropStage, SensorSample};

// ---

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1200);

/// Shortest cadence the timer accepts; shorter intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Generates agronomically plausible samples while anyone is listening.
pub struct SyntheticSource {
    inner: Arc<Inner>,
}

struct Inner {
    interval: Duration,
    seed: Option<u64>,
    status: PortStatus,
    samples: SubscriberRegistry<SensorSample>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SyntheticSource {
    pub fn new(interval: Duration) -> Self {
        Self::build(interval, None)
    }

    /// Deterministic sequence, for tests and demos.
    pub fn with_seed(interval: Duration, seed: u64) -> Self {
        Self::build(interval, Some(seed))
    }

    fn build(interval: Duration, seed: Option<u64>) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval: interval.max(MIN_INTERVAL),
                seed,
                status: PortStatus::default(),
                samples: SubscriberRegistry::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Whether the timer task is alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.inner.stop_locked(&mut self.inner.timer.lock());
    }
}

impl Inner {
    fn start_locked(self: &Arc<Self>, timer: &mut Option<JoinHandle<()>>) {
        // ---
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let epoch = self.status.begin();
        let Ok(runtime) = Handle::try_current() else {
            self.status.record_error(epoch, "mock", &TransportError::NoRuntime);
            *timer = None;
            return;
        };
        self.status.set_state(epoch, ConnectionState::Connected);
        info!(interval_ms = self.interval.as_millis() as u64, "synthetic source started");
        *timer = Some(runtime.spawn(Arc::clone(self).run(epoch)));
    }

    fn stop_locked(&self, timer: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = timer.take() {
            handle.abort();
            info!("synthetic source stopped");
        }
        self.status.end();
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        // ---
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let sample = generate(&mut rng, now_ms());
            match self.samples.dispatch(&sample) {
                Ok(n) => debug!(subscribers = n, ts = sample.ts, "synthetic sample"),
                Err(e) => self.status.record_error(epoch, "mock", &e),
            }
        }
    }
}

impl Release for Inner {
    fn release(&self, id: Uuid, channel: Channel) {
        // ---
        if channel != Channel::Samples {
            return;
        }
        let mut timer = self.timer.lock();
        if self.samples.remove(id) == Some(0) {
            self.stop_locked(&mut timer);
        }
    }
}

impl IngestionPort for SyntheticSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn subscribe(&self, callback: SampleCallback) -> Subscription {
        // ---
        let mut timer = self.inner.timer.lock();
        let (id, count) = self.inner.samples.insert(callback);
        if count == 1 {
            self.inner.start_locked(&mut timer);
        }
        let owner: Weak<dyn Release> = Arc::downgrade(&self.inner) as Weak<dyn Release>;
        Subscription::new(id, Channel::Samples, owner)
    }

    fn start(&self) {
        self.inner.start_locked(&mut self.inner.timer.lock());
    }

    fn stop(&self) {
        self.inner.stop_locked(&mut self.inner.timer.lock());
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

/// One random reading inside field-realistic ranges.
pub fn generate<R: Rng>(rng: &mut R, ts: i64) -> SensorSample {
    // ---
    let mut pick = |min: f64, max: f64| round2(rng.gen_range(min..max));

    let temperature_c = pick(18.0, 32.0);
    let humidity_pct = pick(60.0, 98.0);
    let soil_moisture_pct = pick(20.0, 60.0);
    let reference_et_mm = pick(0.1, 9.8);
    let evapotranspiration_mm = pick(0.0, 9.7);
    let crop_coefficient = pick(0.42, 1.5);
    let nitrogen_mg_kg = pick(40.0, 120.0);
    let phosphorus_mg_kg = pick(20.0, 100.0);
    let potassium_mg_kg = pick(40.0, 140.0);
    let solar_radiation_ghi = pick(50.0, 800.0);
    let wind_speed = pick(0.5, 4.2);
    let days_planted = pick(1.0, 130.0).floor();
    let ph = pick(3.5, 7.5);
    let raining = pick(0.0, 1.0) >= 0.4;
    let precipitation_mm = if raining { pick(0.1, 10.0) } else { 0.0 };

    SensorSample {
        ts,
        temperature_c,
        humidity_pct,
        soil_moisture_pct,
        reference_et_mm,
        evapotranspiration_mm,
        crop_coefficient,
        crop_stage: CropStage::Mid,
        nitrogen_mg_kg,
        phosphorus_mg_kg,
        potassium_mg_kg,
        solar_radiation_ghi,
        wind_speed,
        days_planted,
        ph,
        precipitation_mm,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ingestion::sample_callback;
    use tokio::sync::Barrier;

    const TICK: Duration = Duration::from_millis(1000);

    fn collector() -> (Arc<Mutex<Vec<SensorSample>>>, SampleCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, sample_callback(move |s| sink.lock().push(*s)))
    }

    #[test]
    fn test_generated_values_in_range() {
        // ---
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let s = generate(&mut rng, 1);
            assert!((20.0..=60.0).contains(&s.soil_moisture_pct));
            assert!((18.0..=32.0).contains(&s.temperature_c));
            assert!((3.5..=7.5).contains(&s.ph));
            assert!(s.precipitation_mm == 0.0 || (0.1..=10.0).contains(&s.precipitation_mm));
            assert_eq!(s.days_planted.fract(), 0.0);
            assert_eq!(s.crop_stage, CropStage::Mid);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_until_first_subscriber() {
        // ---
        let source = SyntheticSource::with_seed(TICK, 1);
        assert!(!source.is_running());
        assert_eq!(source.state(), ConnectionState::Disconnected);

        tokio::time::sleep(TICK * 3).await;
        assert!(!source.is_running());

        let (seen, cb) = collector();
        let sub = source.subscribe(cb);
        assert!(source.is_running());
        assert!(source.is_connected());

        tokio::time::sleep(TICK * 3 + TICK / 2).await;
        assert_eq!(seen.lock().len(), 3);

        sub.unsubscribe();
        assert!(!source.is_running());
        assert!(!source.is_connected());

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_timer_for_many_subscribers() {
        // ---
        let source = SyntheticSource::with_seed(TICK, 2);
        let (first, cb1) = collector();
        let (second, cb2) = collector();

        let sub1 = source.subscribe(cb1);
        let sub2 = source.subscribe(cb2);
        assert_eq!(source.subscriber_count(), 2);

        // One timer: each subscriber sees one sample per tick
        tokio::time::sleep(TICK * 2 + TICK / 2).await;
        assert_eq!(first.lock().len(), 2);
        assert_eq!(*first.lock(), *second.lock());

        drop(sub1);
        assert!(source.is_running());

        drop(sub2);
        assert!(!source.is_running());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        // ---
        let source = SyntheticSource::with_seed(TICK, 3);
        source.start();
        source.start();
        assert!(source.is_running());

        let (seen, cb) = collector();
        let _sub = source.subscribe(cb);
        tokio::time::sleep(TICK + TICK / 2).await;
        assert_eq!(seen.lock().len(), 1);

        source.stop();
        source.stop();
        assert!(!source.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_panic_recorded_timer_survives() {
        // ---
        let source = SyntheticSource::with_seed(TICK, 4);
        let (seen, cb) = collector();
        let _bad = source.subscribe(sample_callback(|_| panic!("bad widget")));
        let _good = source.subscribe(cb);

        tokio::time::sleep(TICK * 2 + TICK / 2).await;

        assert_eq!(seen.lock().len(), 2);
        let err = source.last_error().expect("panic should be recorded");
        assert!(err.contains("bad widget"));
        assert!(source.is_running());
    }

    /// Starts and stops seen so far; each opens or closes one status epoch.
    fn transitions(source: &SyntheticSource) -> u64 {
        source.inner.status.inner.lock().epoch
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        // ---
        let source = SyntheticSource::with_seed(Duration::ZERO, 5);
        assert_eq!(source.interval(), MIN_INTERVAL);

        let (seen, cb) = collector();
        let _sub = source.subscribe(cb);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!seen.lock().is_empty());
        assert!(source.is_running());
        assert_eq!(source.last_error(), None);
    }

    #[test]
    fn test_subscribe_outside_runtime_reports_status() {
        // ---
        let source = SyntheticSource::with_seed(TICK, 8);
        let _sub = source.subscribe(sample_callback(|_| {}));

        assert_eq!(source.subscriber_count(), 1);
        assert!(!source.is_running());
        assert_eq!(source.state(), ConnectionState::Disconnected);
        assert!(source.last_error().unwrap().contains("no tokio runtime"));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            source.start();
            assert!(source.is_running());
            assert!(source.is_connected());
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribers_share_one_timer() {
        // ---
        const N: usize = 16;
        let source = Arc::new(SyntheticSource::with_seed(TICK * 60, 6));

        let barrier = Arc::new(Barrier::new(N));
        let joins: Vec<_> = (0..N)
            .map(|_| {
                let source = Arc::clone(&source);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    source.subscribe(sample_callback(|_| {}))
                })
            })
            .collect();

        let mut subs = Vec::new();
        for join in joins {
            subs.push(join.await.unwrap());
        }
        assert_eq!(source.subscriber_count(), N);
        assert!(source.is_running());
        assert_eq!(transitions(&source), 1);

        let barrier = Arc::new(Barrier::new(N));
        let joins: Vec<_> = subs
            .into_iter()
            .map(|sub| {
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    drop(sub);
                })
            })
            .collect();
        for join in joins {
            join.await.unwrap();
        }

        assert_eq!(source.subscriber_count(), 0);
        assert!(!source.is_running());
        assert_eq!(transitions(&source), 2);
    }
}
