use crate::sensor::{MonitorKey, Sample};

/// Receiver of representative values, called once per tick per monitored pair
///
/// Implementations render gauges, print summaries or record values for tests.
/// `Sample::Unavailable` is how a display learns a pair could not be read.
pub trait Display: Send {
    fn set_value(&mut self, key: MonitorKey, sample: Sample);
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn set_value(&mut self, key: MonitorKey, sample: Sample) {
        (**self).set_value(key, sample)
    }
}

/// Display that discards everything
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn set_value(&mut self, _key: MonitorKey, _sample: Sample) {}
}
