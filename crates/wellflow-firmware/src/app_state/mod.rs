//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `wellflow_core` and
//! adds ESP32-specific hardware initialization: the flow sensor interrupt,
//! the I2C bus and the status LED.

mod hardware;

pub use hardware::*;

// Re-export all shared app state types from wellflow-core
pub use wellflow_core::app_state::*;
