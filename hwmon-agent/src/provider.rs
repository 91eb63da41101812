//! Sensor provider backed by `sysinfo`
//!
//! Provides the local machine as a set of devices:
//! - One device per temperature chip, classified from its label prefix
//! - The processor load (per core, then the global load last)
//! - Memory used and available, in GB
//!
//! Aggregate temperatures (package, composite, Tctl/Tdie, GPU edge) are placed
//! after the per-core ones so they end up as the representative value.

use hwmon_engine::{DeviceId, HardwareClass, MeasurementKind, ProviderError, SensorProvider, SensorReading};
use std::time::{Duration, Instant};
use sysinfo::{Components, System};
use tracing::debug;

/// How often the component list itself is rescanned
const RESCAN_EVERY: Duration = Duration::from_secs(10);

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

const CPU_CHIPS: &[&str] = &["coretemp", "k10temp", "k8temp", "zenpower", "cpu"];
const HDD_CHIPS: &[&str] = &["nvme", "drivetemp"];
const ATI_CHIPS: &[&str] = &["amdgpu", "radeon"];
const NVIDIA_CHIPS: &[&str] = &["nouveau", "nvidia"];
const SUPERIO_CHIPS: &[&str] = &["nct", "it8", "w83", "f71", "f81"];
const AGGREGATE_LABELS: &[&str] = &["package", "composite", "tctl", "tdie", "edge"];

#[derive(Debug, Clone, PartialEq)]
enum Source {
    /// Component indices, already in sensor index order
    Chip(Vec<usize>),
    Processor,
    Memory,
}

pub struct SysinfoProvider {
    system: System,
    components: Components,
    devices: Vec<(DeviceId, Source)>,
    last_scan: Option<Instant>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system,
            components: Components::new(),
            devices: Vec::new(),
            last_scan: None,
        }
    }

    fn rescan(&mut self) {
        self.components.refresh_list();
        self.last_scan = Some(Instant::now());

        let labels: Vec<&str> = self.components.list().iter().map(|c| c.label()).collect();
        let mut devices: Vec<(DeviceId, Source)> = group_chips(&labels)
            .into_iter()
            .map(|(id, members)| (id, Source::Chip(members)))
            .collect();
        devices.push((DeviceId::new(HardwareClass::Cpu, "Processor"), Source::Processor));
        devices.push((DeviceId::new(HardwareClass::Ram, "Memory"), Source::Memory));

        debug!("Rescanned {} components into {} devices", labels.len(), devices.len());
        self.devices = devices;
    }

    fn source(&self, device: &DeviceId) -> Result<&Source, ProviderError> {
        self.devices
            .iter()
            .find(|(id, _)| id == device)
            .map(|(_, source)| source)
            .ok_or_else(|| ProviderError::UnknownDevice(device.clone()))
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorProvider for SysinfoProvider {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError> {
        let due = self.last_scan.map_or(true, |at| at.elapsed() >= RESCAN_EVERY);
        if due {
            self.rescan();
        }
        Ok(self.devices.iter().map(|(id, _)| id.clone()).collect())
    }

    fn refresh(&mut self, device: &DeviceId) -> Result<(), ProviderError> {
        match self.source(device)?.clone() {
            Source::Chip(members) => {
                let components = self.components.list_mut();
                for index in members {
                    if let Some(component) = components.get_mut(index) {
                        component.refresh();
                    }
                }
            }
            Source::Processor => self.system.refresh_cpu_usage(),
            Source::Memory => self.system.refresh_memory(),
        }
        Ok(())
    }

    fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError> {
        let reading = |kind, index: usize, name: String, value: f64| SensorReading {
            device: device.clone(),
            kind,
            index: index as u32,
            name,
            value: value.is_finite().then_some(value),
        };

        let readings = match self.source(device)? {
            Source::Chip(members) => {
                let components = self.components.list();
                members
                    .iter()
                    .filter_map(|&i| components.get(i))
                    .enumerate()
                    .map(|(index, component)| {
                        let label = component.label();
                        reading(
                            MeasurementKind::Temperature,
                            index,
                            sensor_name(label).to_string(),
                            f64::from(component.temperature()),
                        )
                    })
                    .collect()
            }
            Source::Processor => {
                let cpus = self.system.cpus();
                let mut readings: Vec<SensorReading> = cpus
                    .iter()
                    .enumerate()
                    .map(|(index, cpu)| {
                        reading(MeasurementKind::Load, index, format!("CPU Core #{}", index + 1), f64::from(cpu.cpu_usage()))
                    })
                    .collect();
                readings.push(reading(
                    MeasurementKind::Load,
                    cpus.len(),
                    "CPU Total".to_string(),
                    f64::from(self.system.global_cpu_info().cpu_usage()),
                ));
                readings
            }
            Source::Memory => vec![
                reading(
                    MeasurementKind::Data,
                    0,
                    "Used Memory".to_string(),
                    self.system.used_memory() as f64 / BYTES_PER_GB,
                ),
                reading(
                    MeasurementKind::Data,
                    1,
                    "Available Memory".to_string(),
                    self.system.available_memory() as f64 / BYTES_PER_GB,
                ),
            ],
        };
        Ok(readings)
    }
}

/// Chip part of a component label, e.g. "coretemp" in "coretemp Core 0"
fn chip_name(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or("unknown")
}

/// Sensor part of a component label; the whole label when there is nothing after the chip
fn sensor_name(label: &str) -> &str {
    match label.trim().split_once(char::is_whitespace) {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => label.trim(),
    }
}

fn classify_chip(chip: &str) -> HardwareClass {
    let chip = chip.to_ascii_lowercase();
    let matches = |prefixes: &[&str]| prefixes.iter().any(|p| chip.starts_with(p));

    if matches(CPU_CHIPS) {
        HardwareClass::Cpu
    } else if matches(HDD_CHIPS) {
        HardwareClass::Hdd
    } else if matches(ATI_CHIPS) {
        HardwareClass::GpuAti
    } else if matches(NVIDIA_CHIPS) {
        HardwareClass::GpuNvidia
    } else if matches(SUPERIO_CHIPS) {
        HardwareClass::SuperIo
    } else {
        HardwareClass::Mainboard
    }
}

fn is_aggregate(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    AGGREGATE_LABELS.iter().any(|a| label.contains(a))
}

/// Group component labels into devices, keeping first-seen chip order
///
/// Within a chip the declared order is kept, except that aggregate sensors move to the end.
fn group_chips(labels: &[&str]) -> Vec<(DeviceId, Vec<usize>)> {
    let mut groups: Vec<(DeviceId, Vec<usize>)> = Vec::new();

    for (i, label) in labels.iter().enumerate() {
        let chip = chip_name(label);
        let id = DeviceId::new(classify_chip(chip), chip);
        match groups.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, members)) => members.push(i),
            None => groups.push((id, vec![i])),
        }
    }

    for (_, members) in &mut groups {
        members.sort_by_key(|&i| is_aggregate(labels[i]));
    }
    groups
}
