/*!
Test harness for the monitoring pipeline

Wires a `PollScheduler` around a scripted provider and recording collaborators:
- Tick by tick driving with access to every report
- Limit edits through the same handle a UI would use
- Expectations on alert counts, checked in one call
*/

use crate::fake_provider::{ProviderProbe, ScriptedProvider};
use crate::recorders::{RecordingAlertSink, RecordingDisplay};
use anyhow::Result;
use hwmon_engine::{
    HardwareClass, LimitHandle, MeasurementKind, MonitorConfig, MonitorKey, PollScheduler, TickReport, WatchConfig,
};
use std::sync::Arc;
use tracing::info;

/// Install a test-friendly tracing subscriber once per process
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hwmon_engine=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
struct Expectation {
    key: MonitorKey,
    alerts: usize,
}

/// Complete pipeline around scripted hardware
pub struct TestHarness {
    pub scheduler: PollScheduler,
    pub display: RecordingDisplay,
    pub alerts: RecordingAlertSink,
    pub probe: ProviderProbe,
    pub reports: Vec<TickReport>,
    expectations: Vec<Expectation>,
}

impl TestHarness {
    /// Harness watching the given pairs with their initial limits
    pub fn new(provider: ScriptedProvider, watches: &[(HardwareClass, MeasurementKind, f64)]) -> Result<Self> {
        init_test_logging();

        let config = MonitorConfig {
            interval_ms: 5,
            refresh_timeout_ms: 1000,
            watches: watches
                .iter()
                .map(|&(class, kind, limit)| WatchConfig::new(class, kind, limit))
                .collect(),
        };
        Self::with_config(provider, &config)
    }

    pub fn with_config(provider: ScriptedProvider, config: &MonitorConfig) -> Result<Self> {
        init_test_logging();

        let display = RecordingDisplay::new();
        let alerts = RecordingAlertSink::new();
        let probe = provider.probe();
        let scheduler = PollScheduler::new(
            config,
            Box::new(provider),
            Box::new(display.clone()),
            Arc::new(alerts.clone()),
        )?;

        Ok(Self {
            scheduler,
            display,
            alerts,
            probe,
            reports: Vec::new(),
            expectations: Vec::new(),
        })
    }

    pub fn limits(&self) -> LimitHandle {
        self.scheduler.limits()
    }

    /// Run one synchronous tick and keep its report
    pub fn tick(&mut self) -> &TickReport {
        let report = self.scheduler.tick();
        self.reports.push(report);
        &self.reports[self.reports.len() - 1]
    }

    /// Run `count` ticks
    pub fn ticks(&mut self, count: usize) -> &[TickReport] {
        let start = self.reports.len();
        for _ in 0..count {
            self.tick();
        }
        &self.reports[start..]
    }

    /// Expect exactly `alerts` alert events for `key` by the time expectations are verified
    pub fn expect_alerts(&mut self, key: MonitorKey, alerts: usize) -> &mut Self {
        self.expectations.push(Expectation { key, alerts });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self.alerts.count_for(expectation.key);
            if actual != expectation.alerts {
                anyhow::bail!(
                    "Expectation failed for {}: expected {} alerts, got {}",
                    expectation.key,
                    expectation.alerts,
                    actual
                );
            }
            info!("{}: {} alerts as expected", expectation.key, actual);
        }
        Ok(())
    }
}
