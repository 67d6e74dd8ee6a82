//! SNTP-disciplined wall clock
//!
//! The clock is the embassy uptime plus the Unix time at boot, which is only
//! known after the first successful SNTP exchange. Before that it reports
//! seconds since boot.

use core::cell::Cell;

use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, with_timeout};
use log::{info, warn};
use wellflow_core::network::{ClockSync, LinkError};
use wellflow_core::ntp;
use wellflow_core::time_base::WallClock;

pub const NTP_SERVER: &str = "pool.ntp.org";
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const SYNC_ATTEMPTS: u32 = 3;

pub struct SyncedClock {
    boot_unix: Mutex<CriticalSectionRawMutex, Cell<u64>>,
}

impl SyncedClock {
    pub const fn new() -> Self {
        Self {
            boot_unix: Mutex::new(Cell::new(0)),
        }
    }

    /// Anchor the clock so that it reads `now_unix` at this instant.
    pub fn set_unix(&self, now_unix: u64) {
        let boot_unix = now_unix.saturating_sub(Instant::now().as_secs());
        self.boot_unix.lock(|cell| cell.set(boot_unix));
    }
}

impl Default for SyncedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SyncedClock {
    fn now_unix(&self) -> u64 {
        self.boot_unix.lock(Cell::get) + Instant::now().as_secs()
    }
}

/// One-shot SNTP query against [`NTP_SERVER`].
pub struct SntpClockSync<'a> {
    stack: Stack<'a>,
    clock: &'a SyncedClock,
}

impl<'a> SntpClockSync<'a> {
    pub fn new(stack: Stack<'a>, clock: &'a SyncedClock) -> Self {
        Self { stack, clock }
    }

    async fn query(&self) -> Option<u64> {
        let addresses = match self.stack.dns_query(NTP_SERVER, DnsQueryType::A).await {
            Ok(addresses) => addresses,
            Err(err) => {
                warn!("DNS lookup of {} failed: {:?}", NTP_SERVER, err);
                return None;
            }
        };
        let server = *addresses.first()?;

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buf = [0u8; ntp::PACKET_LEN * 2];
        let mut tx_buf = [0u8; ntp::PACKET_LEN * 2];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buf,
            &mut tx_meta,
            &mut tx_buf,
        );
        if let Err(err) = socket.bind(0) {
            warn!("SNTP socket bind failed: {:?}", err);
            return None;
        }

        let request = ntp::request_packet();
        if let Err(err) = socket
            .send_to(&request, IpEndpoint::new(server, ntp::NTP_PORT))
            .await
        {
            warn!("SNTP request to {} failed: {:?}", server, err);
            return None;
        }

        let mut reply = [0u8; ntp::PACKET_LEN];
        match with_timeout(REPLY_TIMEOUT, socket.recv_from(&mut reply)).await {
            Ok(Ok((len, _))) => ntp::parse_unix_seconds(&reply[..len]),
            Ok(Err(err)) => {
                warn!("SNTP receive failed: {:?}", err);
                None
            }
            Err(_) => {
                warn!("SNTP reply from {} timed out", server);
                None
            }
        }
    }
}

impl ClockSync for SntpClockSync<'_> {
    async fn sync(&mut self) -> Result<(), LinkError> {
        for attempt in 1..=SYNC_ATTEMPTS {
            if let Some(now_unix) = self.query().await {
                self.clock.set_unix(now_unix);
                info!("SNTP time is {} (attempt {})", now_unix, attempt);
                return Ok(());
            }
        }
        Err(LinkError::ClockSync)
    }
}
