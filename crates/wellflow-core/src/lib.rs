//! Hardware-independent core library for wellflow
//!
//! This crate contains all platform-agnostic logic for the wellflow well
//! pump flow monitor: pulse counting, per-minute and per-day statistics,
//! wireless link supervision, the HTTP stats server and the task wiring
//! that ties them together. Hardware is reached only through small traits
//! (clock, radio link, temperature sensor, indicator pin, TCP listener).
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod aggregator;
pub mod app_state;
pub mod config;
pub mod network;
pub mod ntp;
pub mod pulse;
pub mod runtime;
pub mod sensors;
pub mod server;
pub mod time_base;

#[cfg(test)]
mod testing;
