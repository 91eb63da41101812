//! Reduction of many raw sensors to one representative value per pair
//!
//! Multi-unit devices report one reading per sub-unit at the low indices and the
//! aggregate (package, composite) reading at the highest index. Picking the highest
//! index selects the aggregate without knowing how many sub-units a device has.
//! The choice is positional: the largest value is never preferred for its own sake.

use crate::catalog::Snapshot;
use crate::sensor::{HardwareClass, MeasurementKind, MonitorKey, Observation, Sample};

/// Highest-index selection policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassSelector;

impl ClassSelector {
    pub fn new() -> Self {
        Self
    }

    /// Representative value for `class`/`kind`, or `Sample::Unavailable` when nothing matches
    pub fn select(&self, snapshot: &Snapshot, class: HardwareClass, kind: MeasurementKind) -> Sample {
        self.representative(snapshot, class, kind)
            .map_or(Sample::Unavailable, |reading| Sample::Value(reading.value))
    }

    pub fn select_key(&self, snapshot: &Snapshot, key: MonitorKey) -> Sample {
        self.select(snapshot, key.class, key.kind)
    }

    /// The reading `select` takes its value from.
    ///
    /// Ties on the highest index go to the first reading in snapshot order.
    pub fn representative<'a>(
        &self,
        snapshot: &'a Snapshot,
        class: HardwareClass,
        kind: MeasurementKind,
    ) -> Option<&'a Observation> {
        snapshot
            .readings()
            .iter()
            .filter(|r| r.device.class == class && r.kind == kind)
            .fold(None::<&Observation>, |best, r| match best {
                Some(b) if b.index >= r.index => Some(b),
                _ => Some(r),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::DeviceId;

    fn reading(class: HardwareClass, kind: MeasurementKind, index: u32, value: f64) -> Observation {
        Observation {
            device: DeviceId::new(class, format!("{class}-0")),
            kind,
            index,
            name: format!("sensor {index}"),
            value,
        }
    }

    fn cpu_temp(index: u32, value: f64) -> Observation {
        reading(HardwareClass::Cpu, MeasurementKind::Temperature, index, value)
    }

    #[test]
    fn test_no_match_is_unavailable() {
        let snapshot: Snapshot = vec![reading(HardwareClass::Hdd, MeasurementKind::Temperature, 0, 40.0)]
            .into_iter()
            .collect();

        let selector = ClassSelector::new();
        assert_eq!(
            selector.select(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature),
            Sample::Unavailable
        );
        assert_eq!(
            selector.select(&Snapshot::default(), HardwareClass::Hdd, MeasurementKind::Temperature),
            Sample::Unavailable
        );
    }

    #[test]
    fn test_single_match_regardless_of_index() {
        let snapshot: Snapshot = vec![cpu_temp(7, 61.5)].into_iter().collect();
        assert_eq!(
            ClassSelector.select(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature),
            Sample::Value(61.5)
        );
    }

    #[test]
    fn test_highest_index_wins_over_larger_value() {
        let snapshot: Snapshot = vec![cpu_temp(0, 90.0), cpu_temp(1, 40.0)].into_iter().collect();
        assert_eq!(
            ClassSelector.select(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature),
            Sample::Value(40.0)
        );
    }

    #[test]
    fn test_order_of_snapshot_does_not_matter() {
        let snapshot: Snapshot = vec![cpu_temp(2, 58.0), cpu_temp(0, 55.0), cpu_temp(1, 60.0)]
            .into_iter()
            .collect();
        assert_eq!(
            ClassSelector.select(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature),
            Sample::Value(58.0)
        );
    }

    #[test]
    fn test_other_kinds_and_classes_are_ignored() {
        let snapshot: Snapshot = vec![
            cpu_temp(0, 50.0),
            reading(HardwareClass::Cpu, MeasurementKind::Load, 9, 99.0),
            reading(HardwareClass::GpuAti, MeasurementKind::Temperature, 5, 70.0),
        ]
        .into_iter()
        .collect();

        let chosen = ClassSelector
            .representative(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature)
            .unwrap();
        assert_eq!(chosen.device.class, HardwareClass::Cpu);
        assert_eq!(chosen.kind, MeasurementKind::Temperature);
        assert_eq!(chosen.value, 50.0);
    }

    #[test]
    fn test_tie_on_max_index_keeps_first_declared() {
        let mut second = cpu_temp(3, 72.0);
        second.device.name = "cpu-1".into();
        let snapshot: Snapshot = vec![cpu_temp(1, 10.0), cpu_temp(3, 65.0), second].into_iter().collect();

        assert_eq!(
            ClassSelector.select(&snapshot, HardwareClass::Cpu, MeasurementKind::Temperature),
            Sample::Value(65.0)
        );
    }
}
