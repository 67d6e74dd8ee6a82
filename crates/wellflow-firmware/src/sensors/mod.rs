//! Concrete temperature sensors for the firmware

#[cfg(feature = "sensor-sht40")]
mod sht40;

#[cfg(feature = "sensor-sht40")]
pub use sht40::SHT40Sensor;

use thiserror_no_std::Error;
use wellflow_core::sensors::TemperatureSensor;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("no temperature sensor fitted")]
    NotFitted,
}

/// Stand-in used when the firmware is built without a temperature sensor.
pub struct NoSensor;

impl TemperatureSensor for NoSensor {
    type Error = SensorError;

    async fn read(&mut self) -> Result<f32, SensorError> {
        Err(SensorError::NotFitted)
    }
}
