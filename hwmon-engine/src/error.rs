use crate::sensor::{DeviceId, MonitorKey};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a sensor provider; never fatal to the poll loop
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("device enumeration failed: {0}")]
    Enumeration(String),
    #[error("refresh of {device} failed: {reason}")]
    Refresh { device: DeviceId, reason: String },
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider call aborted: {0}")]
    Aborted(String),
}

/// Caller errors raised by the engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("{0} is not a monitored pair")]
    Unmonitored(MonitorKey),
    #[error("limit for {key} must be a finite number, got {value}")]
    InvalidLimit { key: MonitorKey, value: f64 },
    #[error("{0} is watched more than once")]
    DuplicateWatch(MonitorKey),
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
