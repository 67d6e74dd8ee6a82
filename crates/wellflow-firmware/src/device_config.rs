//! Build-time device settings
//!
//! Injected by `build.rs` from `.env` (see `.env.example`).

use wellflow_core::config::{ConfigError, DeviceConfig};

pub const WIFI_SSID: &str = env!("WELLFLOW_WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WELLFLOW_WIFI_PASSWORD");
pub const UTC_OFFSET_HOURS: &str = env!("WELLFLOW_UTC_OFFSET_HOURS");
pub const COUNTRY_CODE: &str = env!("WELLFLOW_COUNTRY_CODE");

/// Validate the injected settings.
pub fn device_config() -> Result<DeviceConfig<'static>, ConfigError> {
    DeviceConfig::new(WIFI_SSID, WIFI_PASSWORD, UTC_OFFSET_HOURS, COUNTRY_CODE)
}
