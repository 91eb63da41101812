//! Console rendering of representative values
//!
//! Keeps the latest sample per monitored pair and logs a one-line summary at a
//! fixed cadence instead of once per tick. The summary is only considered when a
//! new round of pairs begins, so it always shows one complete tick.

use hwmon_engine::{Display, MonitorKey, Sample};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

pub struct ConsoleDisplay {
    latest: BTreeMap<MonitorKey, Sample>,
    /// First pair pushed in every round
    round_start: Option<MonitorKey>,
    summary_every: Duration,
    last_summary: Option<Instant>,
    last_line: Option<String>,
}

impl ConsoleDisplay {
    pub fn new(summary_every: Duration) -> Self {
        Self {
            latest: BTreeMap::new(),
            round_start: None,
            summary_every,
            last_summary: None,
            last_line: None,
        }
    }

    /// "CPU Temperature 58.0 °C | HDD Temperature n/a"
    pub fn summary(&self) -> String {
        self.latest
            .iter()
            .map(|(key, sample)| format!("{} {}", key, render(*key, *sample)))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn summary_due(&self, now: Instant) -> bool {
        !self.summary_every.is_zero()
            && self
                .last_summary
                .map_or(true, |at| now.duration_since(at) >= self.summary_every)
    }
}

fn render(key: MonitorKey, sample: Sample) -> String {
    match sample {
        Sample::Value(value) => format!("{:.1} {}", value, key.kind.unit()),
        Sample::Unavailable => "n/a".to_string(),
    }
}

impl Display for ConsoleDisplay {
    fn set_value(&mut self, key: MonitorKey, sample: Sample) {
        let round_start = *self.round_start.get_or_insert(key);

        if key == round_start && !self.latest.is_empty() {
            let now = Instant::now();
            if self.summary_due(now) {
                let line = self.summary();
                info!("{}", line);
                self.last_summary = Some(now);
                self.last_line = Some(line);
            }
        }

        self.latest.insert(key, sample);
    }
}
