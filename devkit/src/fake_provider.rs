/*!
Scripted sensor provider for tests without hardware

Replays one frame per refresh cycle. A frame is either a list of devices (with
nested sub-devices) or a failure. The last frame repeats once the script runs out.
*/

use hwmon_engine::{DeviceId, HardwareClass, MeasurementKind, ProviderError, SensorProvider, SensorReading};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One device of a frame, built fluently
#[derive(Debug, Clone)]
pub struct FakeDevice {
    id: DeviceId,
    sensors: Vec<SensorReading>,
    children: Vec<FakeDevice>,
}

impl FakeDevice {
    pub fn new(class: HardwareClass, name: &str) -> Self {
        Self {
            id: DeviceId::new(class, name),
            sensors: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add a sensor at the next free index of its kind on this device
    pub fn sensor(self, kind: MeasurementKind, name: &str, value: f64) -> Self {
        self.reading(kind, name, Some(value))
    }

    /// Add a sensor the hardware could not sample
    pub fn unavailable(self, kind: MeasurementKind, name: &str) -> Self {
        self.reading(kind, name, None)
    }

    /// Add a sensor at an explicit index
    pub fn sensor_at(mut self, kind: MeasurementKind, index: u32, name: &str, value: Option<f64>) -> Self {
        self.sensors.push(SensorReading {
            device: self.id.clone(),
            kind,
            index,
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn child(mut self, device: FakeDevice) -> Self {
        self.children.push(device);
        self
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    fn reading(self, kind: MeasurementKind, name: &str, value: Option<f64>) -> Self {
        let index = self.sensors.iter().filter(|s| s.kind == kind).count() as u32;
        self.sensor_at(kind, index, name, value)
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Devices(Vec<FakeDevice>),
    Failure(String),
}

#[derive(Debug, Default)]
struct ProbeState {
    enumerations: usize,
    refreshed: Vec<DeviceId>,
}

/// Shared view of what the provider was asked to do
#[derive(Debug, Clone, Default)]
pub struct ProviderProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ProviderProbe {
    pub fn enumerations(&self) -> usize {
        self.state.lock().enumerations
    }

    pub fn refreshed(&self) -> Vec<DeviceId> {
        self.state.lock().refreshed.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.enumerations = 0;
        state.refreshed.clear();
    }
}

#[derive(Debug, Default)]
struct DeviceEntry {
    sensors: Vec<SensorReading>,
    children: Vec<DeviceId>,
}

/// Provider replaying scripted frames
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    frames: Vec<Frame>,
    cursor: usize,
    roots: Vec<DeviceId>,
    devices: HashMap<DeviceId, DeviceEntry>,
    failure: Option<String>,
    delay: Duration,
    probe: ProviderProbe,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame of top-level devices
    pub fn frame(mut self, devices: Vec<FakeDevice>) -> Self {
        self.frames.push(Frame::Devices(devices));
        self
    }

    /// Append a frame whose enumeration fails
    pub fn failure(mut self, reason: &str) -> Self {
        self.frames.push(Frame::Failure(reason.to_string()));
        self
    }

    /// Block every enumeration for `delay`, like a slow driver
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probe(&self) -> ProviderProbe {
        self.probe.clone()
    }

    fn advance(&mut self) {
        self.roots.clear();
        self.devices.clear();
        self.failure = None;

        let last = self.frames.len().saturating_sub(1);
        let Some(frame) = self.frames.get(self.cursor.min(last)).cloned() else {
            return;
        };
        self.cursor += 1;

        match frame {
            Frame::Devices(devices) => {
                for device in devices {
                    self.roots.push(device.id.clone());
                    self.install(device);
                }
            }
            Frame::Failure(reason) => self.failure = Some(reason),
        }
    }

    fn install(&mut self, device: FakeDevice) {
        let children = device.children.iter().map(|c| c.id.clone()).collect();
        self.devices.insert(
            device.id.clone(),
            DeviceEntry { sensors: device.sensors, children },
        );
        for child in device.children {
            self.install(child);
        }
    }

    fn entry(&self, device: &DeviceId) -> Result<&DeviceEntry, ProviderError> {
        self.devices
            .get(device)
            .ok_or_else(|| ProviderError::UnknownDevice(device.clone()))
    }
}

impl SensorProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError> {
        self.probe.state.lock().enumerations += 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.advance();
        match &self.failure {
            Some(reason) => Err(ProviderError::Enumeration(reason.clone())),
            None => Ok(self.roots.clone()),
        }
    }

    fn refresh(&mut self, device: &DeviceId) -> Result<(), ProviderError> {
        self.entry(device)?;
        self.probe.state.lock().refreshed.push(device.clone());
        Ok(())
    }

    fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError> {
        Ok(self.entry(device)?.sensors.clone())
    }

    fn sub_devices(&self, device: &DeviceId) -> Result<Vec<DeviceId>, ProviderError> {
        Ok(self.entry(device)?.children.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwmon_engine::SensorCatalog;

    #[test]
    fn test_indices_follow_declaration_order_per_kind() {
        let cpu = FakeDevice::new(HardwareClass::Cpu, "cpu0")
            .sensor(MeasurementKind::Temperature, "Core 0", 50.0)
            .sensor(MeasurementKind::Load, "Total", 12.0)
            .sensor(MeasurementKind::Temperature, "Package", 55.0);

        let indices: Vec<(MeasurementKind, u32)> = cpu.sensors.iter().map(|s| (s.kind, s.index)).collect();
        assert_eq!(
            indices,
            vec![
                (MeasurementKind::Temperature, 0),
                (MeasurementKind::Load, 0),
                (MeasurementKind::Temperature, 1),
            ]
        );
    }

    #[test]
    fn test_frames_replay_then_repeat() {
        let mut provider = ScriptedProvider::new()
            .frame(vec![FakeDevice::new(HardwareClass::Hdd, "sda").sensor(MeasurementKind::Temperature, "t", 35.0)])
            .failure("driver unloaded")
            .frame(vec![]);
        let probe = provider.probe();
        let mut catalog = SensorCatalog::new();

        assert_eq!(catalog.refresh(&mut provider).unwrap(), 1);
        assert!(catalog.refresh(&mut provider).is_err());
        assert_eq!(catalog.refresh(&mut provider).unwrap(), 0);
        assert_eq!(catalog.refresh(&mut provider).unwrap(), 0);
        assert_eq!(probe.enumerations(), 4);
    }

    #[test]
    fn test_nested_devices_are_reachable() {
        let board = FakeDevice::new(HardwareClass::Mainboard, "board")
            .child(FakeDevice::new(HardwareClass::SuperIo, "it8688").sensor(MeasurementKind::Fan, "Fan #1", 900.0));
        let mut provider = ScriptedProvider::new().frame(vec![board]);
        let probe = provider.probe();

        let mut catalog = SensorCatalog::new();
        catalog.refresh(&mut provider).unwrap();

        assert_eq!(probe.refreshed().len(), 2);
        assert_eq!(catalog.readings()[0].device.class, HardwareClass::SuperIo);
    }
}
