//! Fixed-interval poll loop
//!
//! Each tick runs strictly in sequence: provider refresh, catalog rebuild,
//! selection and display push, threshold evaluation and alert dispatch. Ticks never
//! overlap; a slow tick delays the next one instead of piling up behind it.
//!
//! At most one capture exists at a time. A capture that outlives its tick's
//! timeout stays in flight, and later ticks wait on it instead of starting another.

use crate::catalog::{SensorCatalog, Snapshot};
use crate::config::MonitorConfig;
use crate::display::Display;
use crate::error::{EngineError, ProviderError};
use crate::monitor::{AlertEvent, AlertSink, LimitHandle, ThresholdMonitor};
use crate::provider::SensorProvider;
use crate::selector::ClassSelector;
use crate::sensor::{MonitorKey, Sample};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Provider shared with the blocking pool for the duration of a refresh
pub type SharedProvider = Arc<Mutex<Box<dyn SensorProvider>>>;

/// What one tick produced
#[derive(Debug, Clone)]
pub struct TickReport {
    pub readings: usize,
    pub samples: Vec<(MonitorKey, Sample)>,
    pub alerts: Vec<AlertEvent>,
    pub provider_error: Option<ProviderError>,
}

impl TickReport {
    pub fn sample(&self, key: MonitorKey) -> Option<Sample> {
        self.samples.iter().find(|(k, _)| *k == key).map(|(_, s)| *s)
    }
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    pub provider_failures: u64,
    pub alerts: u64,
    pub overruns: u64,
}

pub struct PollScheduler {
    provider: SharedProvider,
    provider_name: String,
    catalog: SensorCatalog,
    selector: ClassSelector,
    monitor: ThresholdMonitor,
    display: Box<dyn Display>,
    watched: Vec<MonitorKey>,
    period: Duration,
    refresh_timeout: Option<Duration>,
    in_flight: Option<JoinHandle<Result<Snapshot, ProviderError>>>,
    provider_failing: bool,
    stats: RunStats,
}

impl PollScheduler {
    pub fn new(
        config: &MonitorConfig,
        provider: Box<dyn SensorProvider>,
        display: Box<dyn Display>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let monitor = ThresholdMonitor::new(config.limits()?, sink);
        let provider_name = provider.name().to_string();

        Ok(Self {
            provider: Arc::new(Mutex::new(provider)),
            provider_name,
            catalog: SensorCatalog::new(),
            selector: ClassSelector::new(),
            watched: monitor.keys(),
            monitor,
            display,
            period: config.interval(),
            refresh_timeout: config.refresh_timeout(),
            in_flight: None,
            provider_failing: false,
            stats: RunStats::default(),
        })
    }

    /// Handle for whoever edits limits while the loop runs
    pub fn limits(&self) -> LimitHandle {
        self.monitor.limits().clone()
    }

    pub fn catalog(&self) -> &SensorCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a capture from an earlier tick is still running on the blocking pool
    pub fn capture_in_flight(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Run one tick on the calling thread
    pub fn tick(&mut self) -> TickReport {
        // A detached capture still holds the lock; waiting on it keeps captures serial.
        self.in_flight = None;
        let captured = {
            let mut provider = self.provider.lock();
            Snapshot::capture(&mut **provider)
        };
        self.complete_tick(captured)
    }

    /// Run one tick with the refresh moved to the blocking pool and bounded by the timeout
    pub async fn tick_async(&mut self) -> TickReport {
        let captured = self.capture_bounded().await;
        self.complete_tick(captured)
    }

    async fn capture_bounded(&mut self) -> Result<Snapshot, ProviderError> {
        let task = match self.in_flight.as_mut() {
            Some(task) => {
                debug!("Previous capture still in flight, waiting on it");
                task
            }
            None => {
                let provider = Arc::clone(&self.provider);
                self.in_flight.insert(tokio::task::spawn_blocking(move || {
                    let mut provider = provider.lock();
                    Snapshot::capture(&mut **provider)
                }))
            }
        };

        let joined = match self.refresh_timeout {
            Some(limit) => match timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return Err(ProviderError::Timeout(limit)),
            },
            None => task.await,
        };
        self.in_flight = None;
        joined.map_err(|e| ProviderError::Aborted(e.to_string()))?
    }

    fn complete_tick(&mut self, captured: Result<Snapshot, ProviderError>) -> TickReport {
        self.stats.ticks += 1;

        let provider_error = match self.catalog.install(captured) {
            Ok(_) => {
                if self.provider_failing {
                    info!("Provider {} recovered", self.provider_name);
                    self.provider_failing = false;
                }
                None
            }
            Err(e) => {
                self.stats.provider_failures += 1;
                if self.provider_failing {
                    debug!("Provider {} still failing: {}", self.provider_name, e);
                } else {
                    warn!("Provider {} failed, every pair is unavailable this tick: {}", self.provider_name, e);
                    self.provider_failing = true;
                }
                Some(e)
            }
        };

        let snapshot = self.catalog.snapshot();
        let samples: Vec<(MonitorKey, Sample)> = self
            .watched
            .iter()
            .map(|&key| (key, self.selector.select_key(snapshot, key)))
            .collect();

        for &(key, sample) in &samples {
            self.display.set_value(key, sample);
        }

        let mut alerts = Vec::new();
        for &(key, sample) in &samples {
            match self.monitor.check(key, sample) {
                Ok(verdict) => alerts.extend(verdict.alert()),
                Err(e) => error!("Evaluation of {} failed: {}", key, e),
            }
        }
        self.stats.alerts += alerts.len() as u64;

        TickReport {
            readings: self.catalog.len(),
            samples,
            alerts,
            provider_error,
        }
    }

    /// Tick at the configured period until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> RunStats
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting poll loop: provider={}, period={:?}, pairs={}",
            self.provider_name,
            self.period,
            self.watched.len()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.tick_async() => {}
            }

            let elapsed = started.elapsed();
            if elapsed > self.period {
                self.stats.overruns += 1;
                debug!("Tick took {:?}, longer than the {:?} period", elapsed, self.period);
            }
        }

        if self.capture_in_flight() {
            debug!("Leaving the last capture of {} to finish on its own", self.provider_name);
        }
        info!(
            "Poll loop stopped after {} ticks ({} provider failures, {} alerts)",
            self.stats.ticks, self.stats.provider_failures, self.stats.alerts
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::LogAlertSink;
    use crate::sensor::{DeviceId, HardwareClass, MeasurementKind, SensorReading};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    const CPU_TEMP: MonitorKey = MonitorKey::new(HardwareClass::Cpu, MeasurementKind::Temperature);

    /// Provider whose CPU temperatures follow a script, one entry per refresh
    struct ScriptProvider {
        script: Vec<Result<Vec<f64>, ProviderError>>,
        refreshes: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl ScriptProvider {
        fn current(&self) -> &Result<Vec<f64>, ProviderError> {
            let at = self.refreshes.load(Ordering::SeqCst).saturating_sub(1);
            &self.script[at.min(self.script.len() - 1)]
        }
    }

    impl SensorProvider for ScriptProvider {
        fn name(&self) -> &str {
            "script"
        }

        fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.current().clone()?;
            Ok(vec![DeviceId::new(HardwareClass::Cpu, "cpu0")])
        }

        fn refresh(&mut self, _device: &DeviceId) -> Result<(), ProviderError> {
            Ok(())
        }

        fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError> {
            let values = self.current().clone()?;
            Ok(values
                .into_iter()
                .enumerate()
                .map(|(i, v)| SensorReading {
                    device: device.clone(),
                    kind: MeasurementKind::Temperature,
                    index: i as u32,
                    name: format!("Core {i}"),
                    value: Some(v),
                })
                .collect())
        }
    }

    /// Records each new span as "name provider"
    #[derive(Clone, Default)]
    struct SpanLog(Arc<Mutex<Vec<String>>>);

    struct ProviderField(String);

    impl Visit for ProviderField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "provider" {
                self.0 = value.to_string();
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> Layer<S> for SpanLog {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let mut provider = ProviderField(String::new());
            attrs.record(&mut provider);
            self.0.lock().push(format!("{} {}", attrs.metadata().name(), provider.0));
        }
    }

    fn scheduler(script: Vec<Result<Vec<f64>, ProviderError>>, limit: f64) -> (PollScheduler, Arc<AtomicUsize>) {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let provider = ScriptProvider { script, refreshes: refreshes.clone(), delay: Duration::ZERO };
        let config = MonitorConfig {
            interval_ms: 5,
            refresh_timeout_ms: 1000,
            watches: vec![crate::config::WatchConfig::new(
                HardwareClass::Cpu,
                MeasurementKind::Temperature,
                limit,
            )],
        };
        let scheduler = PollScheduler::new(
            &config,
            Box::new(provider),
            Box::new(crate::display::NullDisplay),
            Arc::new(LogAlertSink),
        )
        .unwrap();
        (scheduler, refreshes)
    }

    #[test]
    fn test_tick_selects_and_evaluates() {
        let (mut scheduler, _) = scheduler(vec![Ok(vec![55.0, 60.0, 58.0])], 50.0);
        let report = scheduler.tick();

        assert_eq!(report.readings, 3);
        assert_eq!(report.sample(CPU_TEMP), Some(Sample::Value(58.0)));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].value, 58.0);
        assert_eq!(report.alerts[0].limit, 50.0);
    }

    #[test]
    fn test_provider_failure_degrades_single_tick() {
        let (mut scheduler, _) = scheduler(
            vec![
                Ok(vec![90.0]),
                Err(ProviderError::Enumeration("driver gone".into())),
                Ok(vec![91.0]),
            ],
            80.0,
        );

        assert_eq!(scheduler.tick().alerts.len(), 1);

        let failed = scheduler.tick();
        assert!(failed.provider_error.is_some());
        assert_eq!(failed.sample(CPU_TEMP), Some(Sample::Unavailable));
        assert!(failed.alerts.is_empty());
        assert!(scheduler.catalog().is_empty());

        let recovered = scheduler.tick();
        assert_eq!(recovered.sample(CPU_TEMP), Some(Sample::Value(91.0)));
        assert_eq!(scheduler.stats().provider_failures, 1);
        assert_eq!(scheduler.stats().alerts, 2);
    }

    #[test]
    fn test_every_tick_capture_is_traced() {
        let (mut scheduler, _) = scheduler(vec![Ok(vec![40.0])], 80.0);
        let spans = SpanLog::default();
        let subscriber = tracing_subscriber::registry().with(spans.clone());

        tracing::subscriber::with_default(subscriber, || {
            scheduler.tick();
            scheduler.tick();
        });

        let captures: Vec<String> = spans.0.lock().iter().filter(|s| s.starts_with("capture")).cloned().collect();
        assert_eq!(captures, vec!["capture script", "capture script"]);
    }

    #[tokio::test]
    async fn test_slow_refresh_times_out() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let provider = ScriptProvider {
            script: vec![Ok(vec![40.0])],
            refreshes: refreshes.clone(),
            delay: Duration::from_millis(300),
        };
        let config = MonitorConfig { refresh_timeout_ms: 20, ..MonitorConfig::default() };
        let mut scheduler = PollScheduler::new(
            &config,
            Box::new(provider),
            Box::new(crate::display::NullDisplay),
            Arc::new(LogAlertSink),
        )
        .unwrap();

        let report = scheduler.tick_async().await;
        assert!(matches!(report.provider_error, Some(ProviderError::Timeout(_))));
        assert!(report.samples.iter().all(|(_, s)| *s == Sample::Unavailable));
    }

    #[tokio::test]
    async fn test_timed_out_capture_is_not_restarted() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let provider = ScriptProvider {
            script: vec![Ok(vec![40.0])],
            refreshes: refreshes.clone(),
            delay: Duration::from_millis(300),
        };
        let config = MonitorConfig { refresh_timeout_ms: 20, ..MonitorConfig::default() };
        let mut scheduler = PollScheduler::new(
            &config,
            Box::new(provider),
            Box::new(crate::display::NullDisplay),
            Arc::new(LogAlertSink),
        )
        .unwrap();

        for _ in 0..3 {
            let report = scheduler.tick_async().await;
            assert!(matches!(report.provider_error, Some(ProviderError::Timeout(_))));
        }
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert!(scheduler.capture_in_flight());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let report = scheduler.tick_async().await;
        assert!(report.provider_error.is_none());
        assert_eq!(report.sample(CPU_TEMP), Some(Sample::Value(40.0)));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert!(!scheduler.capture_in_flight());

        let report = scheduler.tick_async().await;
        assert!(matches!(report.provider_error, Some(ProviderError::Timeout(_))));
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (scheduler, refreshes) = scheduler(vec![Ok(vec![30.0])], 80.0);
        let watcher = refreshes.clone();
        let shutdown = async move {
            while watcher.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };

        let stats = tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown))
            .await
            .expect("loop should stop once shutdown resolves");
        assert!(stats.ticks >= 2);
        assert_eq!(stats.alerts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_fixed_period() {
        let (scheduler, refreshes) = scheduler(vec![Ok(vec![85.0])], 80.0);
        assert_eq!(scheduler.period(), Duration::from_millis(5));

        let stats = scheduler.run(tokio::time::sleep(Duration::from_millis(100))).await;

        assert!((15..=21).contains(&stats.ticks), "got {} ticks", stats.ticks);
        assert_eq!(stats.alerts, stats.ticks);
        assert_eq!(refreshes.load(Ordering::SeqCst) as u64, stats.ticks);
    }
}
