//! hwmon engine - sensor aggregation and threshold monitoring
//!
//! Samples typed sensor readings from an injected provider, reduces them to one
//! representative value per (hardware class, measurement kind) pair and raises
//! level-triggered alerts when a value exceeds its limit:
//! - `catalog`: latest snapshot of readable sensors, rebuilt every poll
//! - `selector`: highest-index representative selection
//! - `monitor`: limits, breach evaluation, alert dispatch
//! - `scheduler`: fixed-interval tick driving the whole pipeline

pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod monitor;
pub mod provider;
pub mod scheduler;
pub mod selector;
pub mod sensor;

pub use catalog::{SensorCatalog, Snapshot};
pub use config::{ConfigError, MonitorConfig, WatchConfig};
pub use display::{Display, NullDisplay};
pub use error::{EngineError, ProviderError};
pub use monitor::{AlertEvent, AlertSink, LimitHandle, LogAlertSink, ThresholdMonitor, Verdict};
pub use provider::SensorProvider;
pub use scheduler::{PollScheduler, RunStats, TickReport};
pub use selector::ClassSelector;
pub use sensor::{
    DeviceId, HardwareClass, MeasurementKind, MonitorKey, Observation, ParseError, Sample, SensorReading,
};
