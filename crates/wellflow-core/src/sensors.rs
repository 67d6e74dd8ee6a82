//! Sensor trait definitions

/// Device temperature source shown on the stats page.
pub trait TemperatureSensor {
    type Error: core::fmt::Debug;

    /// Read the current temperature in degrees Celsius.
    fn read(&mut self) -> impl Future<Output = Result<f32, Self::Error>>;
}

/// Convert degrees Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}
