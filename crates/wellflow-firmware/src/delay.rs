//! Copyable async delay for handing to every runtime task

use embassy_time::Timer;
use embedded_hal_async::delay::DelayNs;

/// [`DelayNs`] backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskDelay;

impl DelayNs for TaskDelay {
    async fn delay_ns(&mut self, ns: u32) {
        Timer::after_nanos(ns.into()).await;
    }

    async fn delay_us(&mut self, us: u32) {
        Timer::after_micros(us.into()).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Timer::after_millis(ms.into()).await;
    }
}
