use embedded_hal_async::i2c::I2c;
use sht4x::Sht4xAsync;
use wellflow_core::sensors::TemperatureSensor;

use super::SensorError;

pub struct SHT40Sensor<I> {
    sensor: Sht4xAsync<I, embassy_time::Delay>,
}

impl<I: I2c> SHT40Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, embassy_time::Delay>::new(i2c),
        }
    }
}

impl<I: I2c> TemperatureSensor for SHT40Sensor<I> {
    type Error = SensorError;

    async fn read(&mut self) -> Result<f32, SensorError> {
        let measurement = self
            .sensor
            .measure(sht4x::Precision::Medium, &mut embassy_time::Delay)
            .await
            .map_err(|e| {
                log::error!("SHT40 measurement failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "SHT40",
                    operation: "measure temperature",
                }
            })?;

        Ok(measurement.temperature_celsius().to_num::<f32>())
    }
}
