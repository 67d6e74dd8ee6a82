//! Injected device configuration and its validation errors
//!
//! Credentials, the local UTC offset and the radio country code are the only
//! values the device is configured with. They are supplied at build time by
//! the firmware and from the environment by the simulator, then validated
//! once through [`DeviceConfig::new`].

use thiserror_no_std::Error;

/// Accepted range for the local UTC offset, in whole hours.
pub const UTC_OFFSET_RANGE: core::ops::RangeInclusive<i8> = -12..=14;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing `{0}` parameter")]
    MissingParameter(&'static str),
    #[error("`{0}` is not a whole number")]
    NotANumber(heapless::String<16>),
    #[error("{value} is outside the allowed range {min}-{max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("country code `{0}` must be two ASCII letters")]
    CountryCode(heapless::String<16>),
}

impl ConfigError {
    /// Build a [`ConfigError::NotANumber`] keeping as much of the input as fits.
    pub fn not_a_number(raw: &str) -> Self {
        Self::NotANumber(truncated(raw))
    }
}

/// Copy the leading characters of `raw` that fit into a fixed-capacity string.
pub(crate) fn truncated<const N: usize>(raw: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in raw.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Wireless network the device joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    /// ISO 3166 alpha-2 code, always upper case once validated.
    pub country_code: [u8; 2],
}

impl NetworkConfig<'_> {
    pub fn country_code_str(&self) -> &str {
        core::str::from_utf8(&self.country_code).unwrap_or("??")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig<'a> {
    pub network: NetworkConfig<'a>,
    pub utc_offset_hours: i8,
}

impl<'a> DeviceConfig<'a> {
    /// Validate raw configuration strings.
    ///
    /// `utc_offset_hours` and `country_code` arrive as text because both the
    /// firmware (`env!`) and the simulator (process environment) only have
    /// strings to offer.
    pub fn new(
        ssid: &'a str,
        password: &'a str,
        utc_offset_hours: &str,
        country_code: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            network: NetworkConfig {
                ssid,
                password,
                country_code: parse_country_code(country_code)?,
            },
            utc_offset_hours: parse_utc_offset(utc_offset_hours)?,
        })
    }
}

pub fn parse_utc_offset(raw: &str) -> Result<i8, ConfigError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::not_a_number(raw))?;

    let min = *UTC_OFFSET_RANGE.start();
    let max = *UTC_OFFSET_RANGE.end();
    i8::try_from(value)
        .ok()
        .filter(|offset| UTC_OFFSET_RANGE.contains(offset))
        .ok_or(ConfigError::OutOfRange {
            value,
            min: min.into(),
            max: max.into(),
        })
}

pub fn parse_country_code(raw: &str) -> Result<[u8; 2], ConfigError> {
    match raw.trim().as_bytes() {
        [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
            Ok([a.to_ascii_uppercase(), b.to_ascii_uppercase()])
        }
        _ => Err(ConfigError::CountryCode(truncated(raw))),
    }
}
