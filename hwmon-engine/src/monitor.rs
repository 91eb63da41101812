//! Threshold monitoring and alert dispatch
//!
//! Handles:
//! - Per-pair limits, writable from any thread while a tick is running
//! - Level-triggered breach detection (one alert per tick while over the limit)
//! - Fire-and-forget hand-off to an alert sink
//! - Reporting of unreadable pairs, kept apart from alerts

use crate::error::{EngineError, Result};
use crate::sensor::{HardwareClass, MeasurementKind, MonitorKey, Sample};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One limit cell; the `f64` is stored as raw bits so loads are single atomic reads
#[derive(Debug)]
struct LimitSlot {
    key: MonitorKey,
    bits: AtomicU64,
}

/// Shared, cloneable view of the limit table
///
/// The set of monitored pairs is fixed at construction. Only the values change,
/// so reads never lock and never observe a torn value.
#[derive(Debug, Clone)]
pub struct LimitHandle {
    slots: Arc<[LimitSlot]>,
}

impl LimitHandle {
    /// Build the table from `(pair, initial limit)` entries, in monitoring order
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (MonitorKey, f64)>,
    {
        let mut slots: Vec<LimitSlot> = Vec::new();
        for (key, limit) in entries {
            if slots.iter().any(|slot| slot.key == key) {
                return Err(EngineError::DuplicateWatch(key));
            }
            check_finite(key, limit)?;
            slots.push(LimitSlot { key, bits: AtomicU64::new(limit.to_bits()) });
        }
        Ok(Self { slots: slots.into() })
    }

    fn slot(&self, key: MonitorKey) -> Result<&LimitSlot> {
        self.slots
            .iter()
            .find(|slot| slot.key == key)
            .ok_or(EngineError::Unmonitored(key))
    }

    pub fn get(&self, key: MonitorKey) -> Result<f64> {
        Ok(f64::from_bits(self.slot(key)?.bits.load(Ordering::Acquire)))
    }

    /// Overwrite a limit; takes effect no later than the next tick
    pub fn set(&self, key: MonitorKey, limit: f64) -> Result<()> {
        check_finite(key, limit)?;
        self.slot(key)?.bits.store(limit.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Monitored pairs, in configuration order
    pub fn keys(&self) -> impl Iterator<Item = MonitorKey> + '_ {
        self.slots.iter().map(|slot| slot.key)
    }

    /// Current limits, in configuration order
    pub fn entries(&self) -> Vec<(MonitorKey, f64)> {
        self.slots
            .iter()
            .map(|slot| (slot.key, f64::from_bits(slot.bits.load(Ordering::Acquire))))
            .collect()
    }

    pub fn contains(&self, key: MonitorKey) -> bool {
        self.slots.iter().any(|slot| slot.key == key)
    }
}

fn check_finite(key: MonitorKey, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::InvalidLimit { key, value })
    }
}

/// A representative value strictly above its limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub key: MonitorKey,
    pub value: f64,
    pub limit: f64,
    pub at: DateTime<Utc>,
}

/// Receiver of alert events
///
/// `notify` must return promptly and must swallow its own failures. A sink that is
/// still presenting a previous alert drops the new one rather than queueing it.
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: &AlertEvent);
}

impl<S: AlertSink + ?Sized> AlertSink for Arc<S> {
    fn notify(&self, event: &AlertEvent) {
        (**self).notify(event)
    }
}

/// Sink that only logs; used when no presentation is configured
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, event: &AlertEvent) {
        debug!("Alert for {}: {} > {}", event.key, event.value, event.limit);
    }
}

/// Outcome of evaluating one pair
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Value at or below the limit
    Clear,
    /// Value strictly above the limit
    Breach(AlertEvent),
    /// Nothing could be read for the pair; never an alert
    NoData,
}

impl Verdict {
    pub fn alert(self) -> Option<AlertEvent> {
        match self {
            Verdict::Breach(event) => Some(event),
            Verdict::Clear | Verdict::NoData => None,
        }
    }

    pub fn is_breach(&self) -> bool {
        matches!(self, Verdict::Breach(_))
    }
}

/// Compares representative values against limits and dispatches alerts
pub struct ThresholdMonitor {
    limits: LimitHandle,
    sink: Arc<dyn AlertSink>,
    breaching: HashSet<MonitorKey>,
    unreadable: HashSet<MonitorKey>,
}

impl ThresholdMonitor {
    pub fn new(limits: LimitHandle, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            limits,
            sink,
            breaching: HashSet::new(),
            unreadable: HashSet::new(),
        }
    }

    /// Handle for configuration or UI code that edits limits
    pub fn limits(&self) -> &LimitHandle {
        &self.limits
    }

    pub fn keys(&self) -> Vec<MonitorKey> {
        self.limits.keys().collect()
    }

    pub fn set_limit(&self, class: HardwareClass, kind: MeasurementKind, value: f64) -> Result<()> {
        self.limits.set(MonitorKey::new(class, kind), value)
    }

    /// Pure comparison against the current limit; no logging, no dispatch
    pub fn evaluate(&self, class: HardwareClass, kind: MeasurementKind, sample: Sample) -> Result<Verdict> {
        let key = MonitorKey::new(class, kind);
        let limit = self.limits.get(key)?;
        Ok(match sample {
            Sample::Unavailable => Verdict::NoData,
            Sample::Value(value) if value > limit => Verdict::Breach(AlertEvent {
                key,
                value,
                limit,
                at: Utc::now(),
            }),
            Sample::Value(_) => Verdict::Clear,
        })
    }

    /// Evaluate a pair, hand any breach to the sink and log state transitions
    pub fn check(&mut self, key: MonitorKey, sample: Sample) -> Result<Verdict> {
        let verdict = self.evaluate(key.class, key.kind, sample)?;

        match &verdict {
            Verdict::NoData => {
                if self.unreadable.insert(key) {
                    warn!("Can't read {}. Check that the monitor has the privileges its sensors need", key);
                }
                self.breaching.remove(&key);
            }
            Verdict::Clear => {
                if self.unreadable.remove(&key) {
                    info!("{} readable again", key);
                }
                if self.breaching.remove(&key) {
                    info!("{} back within limit", key);
                }
            }
            Verdict::Breach(event) => {
                if self.unreadable.remove(&key) {
                    info!("{} readable again", key);
                }
                if self.breaching.insert(key) {
                    warn!("Exceeded {} ({} > {})", key, event.value, event.limit);
                } else {
                    debug!("Still exceeding {} ({} > {})", key, event.value, event.limit);
                }
                self.sink.notify(event);
            }
        }

        Ok(verdict)
    }

    /// Pairs currently above their limit
    pub fn breaching(&self) -> impl Iterator<Item = &MonitorKey> {
        self.breaching.iter()
    }

    /// Pairs whose last evaluation had no data
    pub fn unreadable(&self) -> impl Iterator<Item = &MonitorKey> {
        self.unreadable.iter()
    }
}
