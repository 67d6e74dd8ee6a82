//! Cooperative task wiring
//!
//! Everything runs on one executor thread. [`run`] joins the four long-lived
//! loops into a single future:
//!
//! - the HTTP accept loop ([`serve_loop`]),
//! - the statistics tick ([`tick_loop`]),
//! - the network watchdog ([`NetworkSupervisor::watchdog_loop`]),
//! - the liveness heartbeat ([`heartbeat_loop`]).
//!
//! Tasks only yield at timed waits and socket I/O. None of them ever returns
//! and none is ever cancelled.

use embassy_futures::join::join4;
use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::info;

use crate::app_state::AppState;
use crate::network::{ClockSync, Link, NetworkSupervisor};
use crate::sensors::TemperatureSensor;
use crate::server::{Listener, serve_loop};
use crate::time_base::WallClock;

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const HEARTBEAT_ON: Duration = Duration::from_millis(250);
pub const HEARTBEAT_OFF: Duration = Duration::from_secs(5);
pub const CONNECTED_FLASH: Duration = Duration::from_millis(300);
pub const CONNECTED_FLASH_COUNT: usize = 3;

/// Wait for `duration` on any [`DelayNs`] implementation.
pub async fn sleep<D: DelayNs>(delay: &mut D, duration: Duration) {
    let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    delay.delay_ms(millis).await;
}

/// Sample statistics every [`TICK_INTERVAL`], starting immediately.
///
/// The first tick seeds the daily history. Never returns.
pub async fn tick_loop<C: WallClock, D: DelayNs>(state: &AppState<'_, C>, mut delay: D) {
    loop {
        state.tick();
        sleep(&mut delay, TICK_INTERVAL).await;
    }
}

/// One short blink followed by a long dark period.
pub async fn heartbeat_cycle<P: OutputPin, D: DelayNs>(indicator: &mut P, delay: &mut D) {
    // The indicator is purely informational, a failed pin write is ignored
    let _ = indicator.set_high();
    sleep(delay, HEARTBEAT_ON).await;
    let _ = indicator.set_low();
    sleep(delay, HEARTBEAT_OFF).await;
}

/// Never returns.
pub async fn heartbeat_loop<P: OutputPin, D: DelayNs>(indicator: &mut P, mut delay: D) {
    loop {
        heartbeat_cycle(indicator, &mut delay).await;
    }
}

/// Blink a few times to show the initial connection succeeded.
pub async fn flash_connected<P: OutputPin, D: DelayNs>(indicator: &mut P, delay: &mut D) {
    for _ in 0..CONNECTED_FLASH_COUNT {
        let _ = indicator.set_high();
        sleep(delay, CONNECTED_FLASH).await;
        let _ = indicator.set_low();
        sleep(delay, CONNECTED_FLASH).await;
    }
}

/// Run all monitor tasks on the current executor. Never returns.
///
/// Expects the link to be up already: call
/// [`NetworkSupervisor::connect`] first and treat its failure as fatal.
pub async fn run<C, L, S, N, T, P, D>(
    state: &AppState<'_, C>,
    supervisor: &mut NetworkSupervisor<'_, L, S>,
    listener: &mut N,
    sensor: &mut T,
    indicator: &mut P,
    delay: D,
) where
    C: WallClock,
    L: Link,
    S: ClockSync,
    N: Listener,
    T: TemperatureSensor,
    P: OutputPin,
    D: DelayNs + Clone,
{
    info!("Starting monitor tasks");
    join4(
        serve_loop(listener, state, sensor, delay.clone()),
        tick_loop(state, delay.clone()),
        supervisor.watchdog_loop(delay.clone()),
        heartbeat_loop(indicator, delay),
    )
    .await;
}
