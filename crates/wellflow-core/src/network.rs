//! Wireless link supervision
//!
//! The radio's own link status is not trusted to notice a dead access point,
//! so [`NetworkSupervisor::watchdog_loop`] tears the link down and rebuilds it
//! on a fixed schedule whether or not it looks healthy. A failed rebuild is
//! logged and left for the next cycle; nothing here ever gives up.

use core::net::Ipv4Addr;

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::config::NetworkConfig;
use crate::runtime::sleep;

/// Delay between link status polls while connecting.
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Status polls allowed before a connect attempt is abandoned.
pub const CONNECT_MAX_POLLS: u32 = 10;
/// Time between forced link resets.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(3600);
/// Pause between tearing the link down and reconnecting.
pub const RECONNECT_SETTLE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    /// Associated with the access point, no address yet
    Associated,
    GotIp,
    WrongPassword,
    NoApFound,
    Failed,
}

impl LinkStatus {
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::WrongPassword | Self::NoApFound | Self::Failed)
    }

    /// Whether polling can stop: either connected or definitively failed.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::GotIp) || self.is_failure()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("radio driver refused to start association")]
    Driver,
    #[error("link rejected with status {0:?}")]
    Rejected(LinkStatus),
    #[error("link not ready after {attempts} polls (last status {last:?})")]
    Timeout { attempts: u32, last: LinkStatus },
    #[error("clock synchronization failed")]
    ClockSync,
}

/// Radio link management.
pub trait Link {
    /// Start associating with the configured network.
    fn begin(
        &mut self,
        config: &NetworkConfig<'_>,
    ) -> impl Future<Output = Result<(), LinkError>>;

    fn status(&mut self) -> LinkStatus;

    /// Tear the link down. Best effort: there is no outcome to observe.
    fn disconnect(&mut self) -> impl Future<Output = ()>;

    fn ipv4_address(&self) -> Option<Ipv4Addr>;
}

/// One-shot wall clock synchronization, run once the link is up.
pub trait ClockSync {
    fn sync(&mut self) -> impl Future<Output = Result<(), LinkError>>;
}

pub struct NetworkSupervisor<'a, L, S> {
    link: L,
    clock_sync: S,
    config: NetworkConfig<'a>,
}

impl<'a, L: Link, S: ClockSync> NetworkSupervisor<'a, L, S> {
    pub fn new(link: L, clock_sync: S, config: NetworkConfig<'a>) -> Self {
        Self {
            link,
            clock_sync,
            config,
        }
    }

    /// Associate and wait for an address, optionally syncing the clock after.
    ///
    /// The link status is polled every [`CONNECT_POLL_INTERVAL`] up to
    /// [`CONNECT_MAX_POLLS`] times. Only [`LinkStatus::GotIp`] counts as
    /// connected.
    pub async fn connect<D: DelayNs>(
        &mut self,
        sync_clock: bool,
        delay: &mut D,
    ) -> Result<(), LinkError> {
        info!(
            "Connecting to \"{}\" (country {})",
            self.config.ssid,
            self.config.country_code_str()
        );
        self.link.begin(&self.config).await?;

        let mut polls_left = CONNECT_MAX_POLLS;
        let status = loop {
            let status = self.link.status();
            if status.is_terminal() || polls_left == 0 {
                break status;
            }
            polls_left -= 1;
            info!("Waiting for connection ({:?})", status);
            sleep(delay, CONNECT_POLL_INTERVAL).await;
        };

        match status {
            LinkStatus::GotIp => {}
            failed if failed.is_failure() => return Err(LinkError::Rejected(failed)),
            last => {
                return Err(LinkError::Timeout {
                    attempts: CONNECT_MAX_POLLS,
                    last,
                });
            }
        }

        match self.link.ipv4_address() {
            Some(address) => info!("Connected, ip = {}", address),
            None => info!("Connected"),
        }

        if sync_clock {
            self.clock_sync.sync().await?;
            info!("Clock synchronized");
        }
        Ok(())
    }

    /// Wait out one watchdog interval, then force a reconnect.
    pub async fn watchdog_cycle<D: DelayNs>(&mut self, delay: &mut D) {
        sleep(delay, WATCHDOG_INTERVAL).await;

        info!("Watchdog: resetting network link");
        self.link.disconnect().await;
        sleep(delay, RECONNECT_SETTLE).await;

        match self.connect(false, delay).await {
            Ok(()) => info!("Watchdog: reconnected"),
            Err(err) => warn!("Watchdog: reconnect failed, retrying next cycle: {}", err),
        }
    }

    /// Never returns.
    pub async fn watchdog_loop<D: DelayNs>(&mut self, mut delay: D) {
        loop {
            self.watchdog_cycle(&mut delay).await;
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingClockSync, RecordingDelay, ScriptedLink};
    use embassy_futures::block_on;

    const CONFIG: NetworkConfig<'static> = NetworkConfig {
        ssid: "well",
        password: "hunter2",
        country_code: *b"US",
    };

    fn supervisor(
        statuses: &[LinkStatus],
    ) -> NetworkSupervisor<'static, ScriptedLink, CountingClockSync> {
        NetworkSupervisor::new(
            ScriptedLink::new(statuses),
            CountingClockSync::default(),
            CONFIG,
        )
    }

    #[test]
    fn test_connect_polls_until_address() {
        let mut supervisor = supervisor(&[
            LinkStatus::Connecting,
            LinkStatus::Associated,
            LinkStatus::GotIp,
        ]);
        let mut delay = RecordingDelay::default();

        assert_eq!(block_on(supervisor.connect(true, &mut delay)), Ok(()));
        assert_eq!(delay.waits_ms, [1000, 1000]);
        assert_eq!(supervisor.clock_sync.syncs, 1);
    }

    #[test]
    fn test_connect_skips_clock_sync_when_not_requested() {
        let mut supervisor = supervisor(&[LinkStatus::GotIp]);
        let mut delay = RecordingDelay::default();

        assert_eq!(block_on(supervisor.connect(false, &mut delay)), Ok(()));
        assert!(delay.waits_ms.is_empty());
        assert_eq!(supervisor.clock_sync.syncs, 0);
    }

    #[test]
    fn test_connect_gives_up_after_poll_budget() {
        let mut supervisor = supervisor(&[LinkStatus::Connecting]);
        let mut delay = RecordingDelay::default();

        assert_eq!(
            block_on(supervisor.connect(true, &mut delay)),
            Err(LinkError::Timeout {
                attempts: CONNECT_MAX_POLLS,
                last: LinkStatus::Connecting
            })
        );
        assert_eq!(delay.waits_ms.len(), CONNECT_MAX_POLLS as usize);
        assert_eq!(supervisor.link().polls, CONNECT_MAX_POLLS as usize + 1);
        assert_eq!(supervisor.clock_sync.syncs, 0);
    }

    #[test]
    fn test_connect_stops_early_on_rejection() {
        let mut supervisor = supervisor(&[LinkStatus::Connecting, LinkStatus::WrongPassword]);
        let mut delay = RecordingDelay::default();

        assert_eq!(
            block_on(supervisor.connect(false, &mut delay)),
            Err(LinkError::Rejected(LinkStatus::WrongPassword))
        );
        assert_eq!(delay.waits_ms, [1000]);
    }

    #[test]
    fn test_connect_reports_driver_and_clock_failures() {
        let mut supervisor = supervisor(&[LinkStatus::GotIp]);
        supervisor.link_mut().begin_result = Err(LinkError::Driver);
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(supervisor.connect(false, &mut delay)),
            Err(LinkError::Driver)
        );

        supervisor.link_mut().begin_result = Ok(());
        supervisor.clock_sync.fail = true;
        assert_eq!(
            block_on(supervisor.connect(true, &mut delay)),
            Err(LinkError::ClockSync)
        );
    }

    #[test]
    fn test_watchdog_cycle_resets_then_reconnects() {
        let mut supervisor = supervisor(&[LinkStatus::GotIp]);
        let mut delay = RecordingDelay::default();

        block_on(supervisor.watchdog_cycle(&mut delay));

        assert_eq!(delay.waits_ms, [3_600_000, 10_000]);
        assert_eq!(supervisor.link().disconnects, 1);
        assert_eq!(supervisor.link().begins, 1);
        assert_eq!(supervisor.clock_sync.syncs, 0);
    }

    #[test]
    fn test_watchdog_cycle_swallows_failed_reconnect() {
        let mut supervisor = supervisor(&[LinkStatus::NoApFound]);
        let mut delay = RecordingDelay::default();

        block_on(supervisor.watchdog_cycle(&mut delay));
        block_on(supervisor.watchdog_cycle(&mut delay));

        assert_eq!(supervisor.link().disconnects, 2);
        assert_eq!(supervisor.link().begins, 2);
    }
}
