//! Sensor catalog: the latest snapshot of every readable sensor
//!
//! The snapshot is rebuilt wholesale on each poll. Nothing carries over between
//! ticks, so a sensor that stops reporting simply disappears.

use crate::error::ProviderError;
use crate::provider::SensorProvider;
use crate::sensor::{DeviceId, Observation};
use tracing::{debug, instrument};

/// Deepest controller nesting followed before the provider is considered broken
const MAX_DEVICE_DEPTH: usize = 8;

/// All available readings captured in one tick, in provider order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    readings: Vec<Observation>,
}

impl Snapshot {
    /// Walk every device and sub-device, refreshing each one and keeping its available sensors
    #[instrument(skip_all, fields(provider = provider.name()))]
    pub fn capture(provider: &mut dyn SensorProvider) -> Result<Self, ProviderError> {
        let mut snapshot = Snapshot::default();
        for device in provider.enumerate_devices()? {
            snapshot.collect_device(provider, &device, 0)?;
        }
        Ok(snapshot)
    }

    fn collect_device(
        &mut self,
        provider: &mut dyn SensorProvider,
        device: &DeviceId,
        depth: usize,
    ) -> Result<(), ProviderError> {
        if depth > MAX_DEVICE_DEPTH {
            return Err(ProviderError::Enumeration(format!(
                "{device} nests sub-devices deeper than {MAX_DEVICE_DEPTH} levels"
            )));
        }

        provider.refresh(device)?;
        self.readings.extend(
            provider
                .sensors(device)?
                .into_iter()
                .filter_map(|reading| reading.observe()),
        );

        for sub in provider.sub_devices(device)? {
            self.collect_device(provider, &sub, depth + 1)?;
        }
        Ok(())
    }

    pub fn readings(&self) -> &[Observation] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl FromIterator<Observation> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self { readings: iter.into_iter().collect() }
    }
}

/// Owner of the current snapshot
#[derive(Debug, Default)]
pub struct SensorCatalog {
    snapshot: Snapshot,
}

impl SensorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the snapshot from the provider.
    ///
    /// On failure the catalog is left empty: stale values are never shown or alerted on.
    pub fn refresh(&mut self, provider: &mut dyn SensorProvider) -> Result<usize, ProviderError> {
        self.install(Snapshot::capture(provider))
    }

    /// Replace the snapshot with the outcome of a capture performed elsewhere
    pub fn install(&mut self, captured: Result<Snapshot, ProviderError>) -> Result<usize, ProviderError> {
        match captured {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                debug!("Catalog rebuilt with {} readings", self.snapshot.len());
                Ok(self.snapshot.len())
            }
            Err(e) => {
                self.snapshot = Snapshot::default();
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn readings(&self) -> &[Observation] {
        self.snapshot.readings()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{HardwareClass, MeasurementKind, SensorReading};
    use std::collections::HashMap;

    /// Minimal in-memory provider; values are swapped between refreshes by the tests
    #[derive(Default)]
    struct TableProvider {
        roots: Vec<DeviceId>,
        children: HashMap<DeviceId, Vec<DeviceId>>,
        sensors: HashMap<DeviceId, Vec<SensorReading>>,
        refreshed: Vec<DeviceId>,
        fail_enumeration: bool,
    }

    impl TableProvider {
        fn add(&mut self, device: &DeviceId, index: u32, value: Option<f64>) {
            self.sensors.entry(device.clone()).or_default().push(SensorReading {
                device: device.clone(),
                kind: MeasurementKind::Temperature,
                index,
                name: format!("temp{index}"),
                value,
            });
        }
    }

    impl SensorProvider for TableProvider {
        fn name(&self) -> &str {
            "table"
        }

        fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError> {
            if self.fail_enumeration {
                return Err(ProviderError::Enumeration("driver not loaded".into()));
            }
            Ok(self.roots.clone())
        }

        fn refresh(&mut self, device: &DeviceId) -> Result<(), ProviderError> {
            self.refreshed.push(device.clone());
            Ok(())
        }

        fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError> {
            Ok(self.sensors.get(device).cloned().unwrap_or_default())
        }

        fn sub_devices(&self, device: &DeviceId) -> Result<Vec<DeviceId>, ProviderError> {
            Ok(self.children.get(device).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_refresh_keeps_only_available_readings() {
        let cpu = DeviceId::new(HardwareClass::Cpu, "cpu0");
        let mut provider = TableProvider { roots: vec![cpu.clone()], ..Default::default() };
        provider.add(&cpu, 0, Some(55.0));
        provider.add(&cpu, 1, None);
        provider.add(&cpu, 2, Some(58.0));

        let mut catalog = SensorCatalog::new();
        assert_eq!(catalog.refresh(&mut provider).unwrap(), 2);
        let indices: Vec<u32> = catalog.readings().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_sub_devices_are_refreshed_and_folded_in() {
        let board = DeviceId::new(HardwareClass::Mainboard, "board");
        let hub = DeviceId::new(HardwareClass::SuperIo, "nct6798");
        let mut provider = TableProvider { roots: vec![board.clone()], ..Default::default() };
        provider.children.insert(board.clone(), vec![hub.clone()]);
        provider.add(&board, 0, Some(30.0));
        provider.add(&hub, 0, Some(41.0));

        let mut catalog = SensorCatalog::new();
        catalog.refresh(&mut provider).unwrap();

        assert_eq!(provider.refreshed, vec![board.clone(), hub.clone()]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.readings()[1].device, hub);
    }

    #[test]
    fn test_refresh_replaces_previous_snapshot() {
        let hdd = DeviceId::new(HardwareClass::Hdd, "sda");
        let mut provider = TableProvider { roots: vec![hdd.clone()], ..Default::default() };
        provider.add(&hdd, 0, Some(38.0));

        let mut catalog = SensorCatalog::new();
        catalog.refresh(&mut provider).unwrap();
        assert_eq!(catalog.len(), 1);

        provider.sensors.clear();
        provider.add(&hdd, 0, None);
        catalog.refresh(&mut provider).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_provider_failure_clears_snapshot() {
        let cpu = DeviceId::new(HardwareClass::Cpu, "cpu0");
        let mut provider = TableProvider { roots: vec![cpu.clone()], ..Default::default() };
        provider.add(&cpu, 0, Some(60.0));

        let mut catalog = SensorCatalog::new();
        catalog.refresh(&mut provider).unwrap();

        provider.fail_enumeration = true;
        let err = catalog.refresh(&mut provider).unwrap_err();
        assert!(matches!(err, ProviderError::Enumeration(_)));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_cyclic_sub_devices_are_rejected() {
        let board = DeviceId::new(HardwareClass::Mainboard, "loop");
        let mut provider = TableProvider { roots: vec![board.clone()], ..Default::default() };
        provider.children.insert(board.clone(), vec![board.clone()]);

        let mut catalog = SensorCatalog::new();
        assert!(catalog.refresh(&mut provider).is_err());
        assert!(catalog.is_empty());
    }
}
