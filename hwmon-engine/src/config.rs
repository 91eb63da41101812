//! Engine configuration
//!
//! Handles:
//! - Poll period and provider refresh timeout
//! - The monitored pairs and their initial limits
//! - Validation before anything is started

use crate::error::EngineError;
use crate::monitor::LimitHandle;
use crate::sensor::{HardwareClass, MeasurementKind, MonitorKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Limit a pair gets when the configuration does not name one
pub const DEFAULT_LIMIT: f64 = 100.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Tick period; 50 ms keeps gauges that do not interpolate looking smooth
    pub interval_ms: u64,
    /// Upper bound on one provider refresh, 0 disables the bound
    pub refresh_timeout_ms: u64,
    #[serde(rename = "watch")]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub class: HardwareClass,
    pub kind: MeasurementKind,
    #[serde(default = "default_limit")]
    pub limit: f64,
}

fn default_limit() -> f64 {
    DEFAULT_LIMIT
}

impl WatchConfig {
    pub fn new(class: HardwareClass, kind: MeasurementKind, limit: f64) -> Self {
        Self { class, kind, limit }
    }

    pub fn key(&self) -> MonitorKey {
        MonitorKey::new(self.class, self.kind)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            refresh_timeout_ms: 2000,
            watches: vec![
                WatchConfig::new(HardwareClass::Cpu, MeasurementKind::Temperature, DEFAULT_LIMIT),
                WatchConfig::new(HardwareClass::Hdd, MeasurementKind::Temperature, DEFAULT_LIMIT),
            ],
        }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.interval_ms == 0 {
            return Err(EngineError::ZeroInterval);
        }
        self.limits().map(|_| ())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        (self.refresh_timeout_ms > 0).then(|| Duration::from_millis(self.refresh_timeout_ms))
    }

    /// Fresh limit table seeded with the configured limits
    pub fn limits(&self) -> Result<LimitHandle, EngineError> {
        LimitHandle::new(self.watches.iter().map(|w| (w.key(), w.limit)))
    }
}
