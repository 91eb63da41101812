/*!
Recording collaborators

Stand-ins for the display and the alert sink that keep everything they receive,
so tests can assert on what the engine pushed out.
*/

use hwmon_engine::{AlertEvent, AlertSink, Display, MonitorKey, Sample};
use parking_lot::Mutex;
use std::sync::Arc;

/// Display keeping every `set_value` call in order
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    values: Arc<Mutex<Vec<(MonitorKey, Sample)>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<(MonitorKey, Sample)> {
        self.values.lock().clone()
    }

    /// Samples pushed for one pair, oldest first
    pub fn history(&self, key: MonitorKey) -> Vec<Sample> {
        self.values
            .lock()
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn last(&self, key: MonitorKey) -> Option<Sample> {
        self.history(key).last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

impl Display for RecordingDisplay {
    fn set_value(&mut self, key: MonitorKey, sample: Sample) {
        self.values.lock().push((key, sample));
    }
}

/// Alert sink keeping every event it is handed
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().clone()
    }

    pub fn count_for(&self, key: MonitorKey) -> usize {
        self.events.lock().iter().filter(|e| e.key == key).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AlertSink for RecordingAlertSink {
    fn notify(&self, event: &AlertEvent) {
        self.events.lock().push(event.clone());
    }
}
