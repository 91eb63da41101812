//! Provider capability consumed by the engine
//!
//! The provider wraps whatever actually talks to the hardware (a driver-backed
//! library, sysfs, a scripted fake). The engine only walks devices, asks each one
//! to refresh and collects its sensors.

use crate::error::ProviderError;
use crate::sensor::{DeviceId, SensorReading};

/// Source of live sensor readings
///
/// Device identities returned by `enumerate_devices` and `sub_devices` must be unique
/// within one provider. Calls are synchronous and may block on hardware access.
pub trait SensorProvider: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Top-level devices, in a stable order
    fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError>;

    /// Trigger a fresh hardware query for one device
    fn refresh(&mut self, device: &DeviceId) -> Result<(), ProviderError>;

    /// Current readings of one device, including unreadable ones
    fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError>;

    /// Nested controllers (e.g. a fan hub on a mainboard)
    fn sub_devices(&self, _device: &DeviceId) -> Result<Vec<DeviceId>, ProviderError> {
        Ok(Vec::new())
    }
}

impl<P: SensorProvider + ?Sized> SensorProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn enumerate_devices(&mut self) -> Result<Vec<DeviceId>, ProviderError> {
        (**self).enumerate_devices()
    }

    fn refresh(&mut self, device: &DeviceId) -> Result<(), ProviderError> {
        (**self).refresh(device)
    }

    fn sensors(&self, device: &DeviceId) -> Result<Vec<SensorReading>, ProviderError> {
        (**self).sensors(device)
    }

    fn sub_devices(&self, device: &DeviceId) -> Result<Vec<DeviceId>, ProviderError> {
        (**self).sub_devices(device)
    }
}
