//! Sensor data model shared by every part of the engine
//!
//! Provides the closed vocabularies and value types:
//! - Hardware classes (CPU, storage, GPU variants, controllers)
//! - Measurement kinds and their implicit units
//! - Raw provider readings and the available observations kept in a snapshot
//! - Monitored pairs and selection results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Category of physical device a sensor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareClass {
    Mainboard,
    SuperIo,
    Cpu,
    Ram,
    GpuNvidia,
    GpuAti,
    TBalancer,
    Heatmaster,
    Hdd,
}

/// Physical quantity reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Voltage,
    Clock,
    Temperature,
    Load,
    Fan,
    Flow,
    Control,
    Level,
    Factor,
    Power,
    Data,
    SmallData,
    Throughput,
}

/// Unknown class or kind name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown hardware class '{0}'")]
    UnknownClass(String),
    #[error("unknown measurement kind '{0}'")]
    UnknownKind(String),
}

impl HardwareClass {
    pub const ALL: [HardwareClass; 9] = [
        HardwareClass::Mainboard,
        HardwareClass::SuperIo,
        HardwareClass::Cpu,
        HardwareClass::Ram,
        HardwareClass::GpuNvidia,
        HardwareClass::GpuAti,
        HardwareClass::TBalancer,
        HardwareClass::Heatmaster,
        HardwareClass::Hdd,
    ];

    /// Display name, as shown on gauges and in logs
    pub fn name(self) -> &'static str {
        match self {
            HardwareClass::Mainboard => "Mainboard",
            HardwareClass::SuperIo => "SuperIO",
            HardwareClass::Cpu => "CPU",
            HardwareClass::Ram => "RAM",
            HardwareClass::GpuNvidia => "GpuNvidia",
            HardwareClass::GpuAti => "GpuAti",
            HardwareClass::TBalancer => "TBalancer",
            HardwareClass::Heatmaster => "Heatmaster",
            HardwareClass::Hdd => "HDD",
        }
    }
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 13] = [
        MeasurementKind::Voltage,
        MeasurementKind::Clock,
        MeasurementKind::Temperature,
        MeasurementKind::Load,
        MeasurementKind::Fan,
        MeasurementKind::Flow,
        MeasurementKind::Control,
        MeasurementKind::Level,
        MeasurementKind::Factor,
        MeasurementKind::Power,
        MeasurementKind::Data,
        MeasurementKind::SmallData,
        MeasurementKind::Throughput,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MeasurementKind::Voltage => "Voltage",
            MeasurementKind::Clock => "Clock",
            MeasurementKind::Temperature => "Temperature",
            MeasurementKind::Load => "Load",
            MeasurementKind::Fan => "Fan",
            MeasurementKind::Flow => "Flow",
            MeasurementKind::Control => "Control",
            MeasurementKind::Level => "Level",
            MeasurementKind::Factor => "Factor",
            MeasurementKind::Power => "Power",
            MeasurementKind::Data => "Data",
            MeasurementKind::SmallData => "SmallData",
            MeasurementKind::Throughput => "Throughput",
        }
    }

    /// Implicit unit of the quantity
    pub fn unit(self) -> &'static str {
        match self {
            MeasurementKind::Voltage => "V",
            MeasurementKind::Clock => "MHz",
            MeasurementKind::Temperature => "°C",
            MeasurementKind::Load => "%",
            MeasurementKind::Fan => "RPM",
            MeasurementKind::Flow => "L/h",
            MeasurementKind::Control => "%",
            MeasurementKind::Level => "%",
            MeasurementKind::Factor => "1",
            MeasurementKind::Power => "W",
            MeasurementKind::Data => "GB",
            MeasurementKind::SmallData => "MB",
            MeasurementKind::Throughput => "MB/s",
        }
    }
}

/// Lowercase and drop separators so "gpu_nvidia", "GpuNvidia" and "gpu-nvidia" compare equal
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for HardwareClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        HardwareClass::ALL
            .into_iter()
            .find(|class| normalize(class.name()) == wanted)
            .ok_or_else(|| ParseError::UnknownClass(s.to_string()))
    }
}

impl FromStr for MeasurementKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        MeasurementKind::ALL
            .into_iter()
            .find(|kind| normalize(kind.name()) == wanted)
            .ok_or_else(|| ParseError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for HardwareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one hardware device exposed by a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub class: HardwareClass,
    pub name: String,
}

impl DeviceId {
    pub fn new(class: HardwareClass, name: impl Into<String>) -> Self {
        Self { class, name: name.into() }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.name)
    }
}

/// One sensor as reported by the provider; `value` is `None` when it could not be sampled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub device: DeviceId,
    pub kind: MeasurementKind,
    pub index: u32,
    pub name: String,
    pub value: Option<f64>,
}

impl SensorReading {
    /// Keep the reading only if it carries a usable value.
    ///
    /// NaN is what some drivers hand back for an unreadable register; it counts as absent.
    pub fn observe(self) -> Option<Observation> {
        let value = self.value.filter(|v| !v.is_nan())?;
        Some(Observation {
            device: self.device,
            kind: self.kind,
            index: self.index,
            name: self.name,
            value,
        })
    }
}

/// An available reading held in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub device: DeviceId,
    pub kind: MeasurementKind,
    pub index: u32,
    pub name: String,
    pub value: f64,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) - {} {} - {}",
            self.device.class, self.kind, self.name, self.device.name, self.index, self.value
        )
    }
}

/// A monitored (hardware class, measurement kind) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonitorKey {
    pub class: HardwareClass,
    pub kind: MeasurementKind,
}

impl MonitorKey {
    pub const fn new(class: HardwareClass, kind: MeasurementKind) -> Self {
        Self { class, kind }
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.class, self.kind)
    }
}

/// Representative value of a pair, or the "no data" sentinel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Sample {
    Value(f64),
    Unavailable,
}

impl Sample {
    /// Needle position gauges fall back to when nothing could be read
    pub const UNAVAILABLE_MARKER: f64 = -1.0;

    pub fn value(self) -> Option<f64> {
        match self {
            Sample::Value(v) => Some(v),
            Sample::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Sample::Value(_))
    }

    /// Bare number for collaborators that cannot represent absence
    pub fn gauge_value(self) -> f64 {
        self.value().unwrap_or(Self::UNAVAILABLE_MARKER)
    }
}

impl From<Option<f64>> for Sample {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Sample::Unavailable, Sample::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("cpu".parse::<HardwareClass>().unwrap(), HardwareClass::Cpu);
        assert_eq!("HDD".parse::<HardwareClass>().unwrap(), HardwareClass::Hdd);
        assert_eq!("gpu_nvidia".parse::<HardwareClass>().unwrap(), HardwareClass::GpuNvidia);
        assert_eq!("super-io".parse::<HardwareClass>().unwrap(), HardwareClass::SuperIo);
        assert_eq!("Temperature".parse::<MeasurementKind>().unwrap(), MeasurementKind::Temperature);
        assert_eq!("small_data".parse::<MeasurementKind>().unwrap(), MeasurementKind::SmallData);
    }

    #[test]
    fn test_parse_unknown_names() {
        assert_eq!(
            "toaster".parse::<HardwareClass>(),
            Err(ParseError::UnknownClass("toaster".to_string()))
        );
        assert!("humidity".parse::<MeasurementKind>().is_err());
    }

    #[test]
    fn test_monitor_key_display() {
        let key = MonitorKey::new(HardwareClass::Cpu, MeasurementKind::Temperature);
        assert_eq!(key.to_string(), "CPU Temperature");
        assert_eq!(MeasurementKind::Temperature.unit(), "°C");
    }

    #[test]
    fn test_observe_drops_missing_and_nan() {
        let reading = |value| SensorReading {
            device: DeviceId::new(HardwareClass::Cpu, "cpu0"),
            kind: MeasurementKind::Temperature,
            index: 0,
            name: "Core 0".into(),
            value,
        };

        assert!(reading(None).observe().is_none());
        assert!(reading(Some(f64::NAN)).observe().is_none());

        let zero = reading(Some(0.0)).observe().unwrap();
        assert_eq!(zero.value, 0.0);
    }

    #[test]
    fn test_sample_sentinel_is_distinct() {
        assert_eq!(Sample::Unavailable.gauge_value(), -1.0);
        assert_eq!(Sample::Value(-1.0).value(), Some(-1.0));
        assert_ne!(Sample::Value(-1.0), Sample::Unavailable);
        assert_eq!(Sample::from(None), Sample::Unavailable);
    }
}
