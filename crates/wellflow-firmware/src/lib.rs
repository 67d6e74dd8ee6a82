//! ESP32-S3 firmware-specific modules for wellflow
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: the flow sensor interrupt, ESP32 peripheral initialization, the
//! Wi-Fi link and SNTP clock, the embassy-net HTTP listener and the SHT40
//! temperature sensor. Everything else lives in `wellflow_core`.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod clock;
pub mod delay;
pub mod device_config;
pub mod http;
pub mod sensors;
pub mod wifi;
