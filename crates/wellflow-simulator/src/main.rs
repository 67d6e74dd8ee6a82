//! Desktop simulator for the wellflow flow monitor.
//!
//! Runs the same `wellflow_core` runtime as the firmware on a single-threaded
//! tokio executor. A background thread plays the flow sensor interrupt, the
//! radio link associates after a couple of polls and the stats page is served
//! on localhost.
//!
//! # Environment
//!
//! | Variable                    | Default     |
//! |-----------------------------|-------------|
//! | `WELLFLOW_WIFI_SSID`        | `simulated` |
//! | `WELLFLOW_WIFI_PASSWORD`    | (empty)     |
//! | `WELLFLOW_UTC_OFFSET_HOURS` | `0`         |
//! | `WELLFLOW_COUNTRY_CODE`     | `US`        |
//! | `WELLFLOW_HTTP_PORT`        | `8080`      |
//!
//! Log output is controlled with `RUST_LOG` (e.g. `RUST_LOG=info`).

use std::convert::Infallible;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use log::{debug, error, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use wellflow_core::aggregator::{Aggregator, Calibration};
use wellflow_core::app_state::AppState;
use wellflow_core::config::{ConfigError, DeviceConfig, NetworkConfig};
use wellflow_core::network::{ClockSync, Link, LinkError, LinkStatus, NetworkSupervisor};
use wellflow_core::pulse::PulseCounter;
use wellflow_core::runtime;
use wellflow_core::sensors::TemperatureSensor;
use wellflow_core::server::{Connection, Listener};
use wellflow_core::time_base::WallClock;

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Pump runs for this long at the start of every cycle.
const PUMP_ON: Duration = Duration::from_secs(120);
const PUMP_CYCLE: Duration = Duration::from_secs(600);
/// Simulated flow while the pump runs.
const PUMP_GALLONS_PER_MINUTE: f32 = 5.0;
/// Granularity of the pulse generator thread.
const PULSE_STEP: Duration = Duration::from_millis(50);

/// Clients that stall while sending or receiving are dropped after this long.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

static PULSES: PulseCounter = PulseCounter::new();

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

struct Settings {
    ssid: String,
    password: String,
    utc_offset_hours: String,
    country_code: String,
    http_port: u16,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            ssid: env_or("WELLFLOW_WIFI_SSID", "simulated"),
            password: env_or("WELLFLOW_WIFI_PASSWORD", ""),
            utc_offset_hours: env_or("WELLFLOW_UTC_OFFSET_HOURS", "0"),
            country_code: env_or("WELLFLOW_COUNTRY_CODE", "US"),
            http_port: env_or("WELLFLOW_HTTP_PORT", "8080").parse().unwrap_or(8080),
        }
    }

    fn device_config(&self) -> Result<DeviceConfig<'_>, ConfigError> {
        DeviceConfig::new(
            &self.ssid,
            &self.password,
            &self.utc_offset_hours,
            &self.country_code,
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Feed [`PULSES`] from a background thread, the way the GPIO interrupt does
/// on the device.
fn spawn_flow_generator() {
    let edges_per_step = Calibration::DEFAULT.ticks_per_unit() as f32 * PUMP_GALLONS_PER_MINUTE
        / 60.0
        * PULSE_STEP.as_secs_f32();

    std::thread::spawn(move || {
        let start = Instant::now();
        let mut owed = 0.0f32;
        loop {
            std::thread::sleep(PULSE_STEP);
            let in_cycle = start.elapsed().as_secs() % PUMP_CYCLE.as_secs();
            if in_cycle >= PUMP_ON.as_secs() {
                continue;
            }
            owed += edges_per_step;
            while owed >= 1.0 {
                PULSES.on_edge();
                owed -= 1.0;
            }
        }
    });
}

/// Host system time.
struct SystemClock;

impl WallClock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Host clock is already synchronized, nothing to do.
struct HostClockSync;

impl ClockSync for HostClockSync {
    async fn sync(&mut self) -> Result<(), LinkError> {
        info!("Using host system time");
        Ok(())
    }
}

/// Associates on the second poll and gets an address on the third.
#[derive(Default)]
struct SimulatedLink {
    up: bool,
    polls: u32,
}

impl Link for SimulatedLink {
    async fn begin(&mut self, config: &NetworkConfig<'_>) -> Result<(), LinkError> {
        info!("Simulated association with \"{}\"", config.ssid);
        self.up = true;
        self.polls = 0;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if !self.up {
            return LinkStatus::Idle;
        }
        self.polls += 1;
        match self.polls {
            1 => LinkStatus::Connecting,
            2 => LinkStatus::Associated,
            _ => LinkStatus::GotIp,
        }
    }

    async fn disconnect(&mut self) {
        info!("Simulated link down");
        self.up = false;
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.up.then_some(Ipv4Addr::LOCALHOST)
    }
}

/// Slowly drifting temperature around 21 °C.
struct SyntheticTemperature {
    start: Instant,
}

impl TemperatureSensor for SyntheticTemperature {
    type Error = Infallible;

    async fn read(&mut self) -> Result<f32, Infallible> {
        let t = self.start.elapsed().as_secs_f32();
        Ok(21.0 + 3.0 * (t / 600.0).sin())
    }
}

/// Status LED that only logs.
struct LogIndicator;

impl PinErrorType for LogIndicator {
    type Error = Infallible;
}

impl OutputPin for LogIndicator {
    fn set_low(&mut self) -> Result<(), Infallible> {
        debug!("LED off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        debug!("LED on");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TokioDelay;

impl DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(Duration::from_nanos(ns.into())).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(ms.into())).await;
    }
}

// ---------------------------------------------------------------------------
// TCP transport
// ---------------------------------------------------------------------------

struct TokioListener {
    listener: tokio::net::TcpListener,
}

impl Listener for TokioListener {
    type Connection<'a>
        = TokioConnection
    where
        Self: 'a;
    type Error = std::io::Error;

    async fn accept(&mut self) -> Result<TokioConnection, std::io::Error> {
        let (stream, peer) = self.listener.accept().await?;
        debug!("Accepted {}", peer);
        Ok(TokioConnection(stream))
    }
}

struct TokioConnection(TcpStream);

#[derive(Debug)]
struct IoError(std::io::Error);

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for IoError {}

impl embedded_io_async::Error for IoError {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            std::io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
            _ => ErrorKind::Other,
        }
    }
}

impl ErrorType for TokioConnection {
    type Error = IoError;
}

/// Run one socket operation, giving up after [`CONNECTION_TIMEOUT`].
async fn within_timeout<T>(io: impl Future<Output = std::io::Result<T>>) -> Result<T, IoError> {
    match tokio::time::timeout(CONNECTION_TIMEOUT, io).await {
        Ok(result) => result.map_err(IoError),
        Err(_) => Err(IoError(std::io::ErrorKind::TimedOut.into())),
    }
}

impl Read for TokioConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        within_timeout(self.0.read(buf)).await
    }
}

impl Write for TokioConnection {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        within_timeout(self.0.write(buf)).await
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        within_timeout(self.0.flush()).await
    }
}

impl Connection for TokioConnection {
    async fn close(&mut self) -> Result<(), IoError> {
        within_timeout(self.0.shutdown()).await
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    info!("Starting wellflow simulator");

    let settings = Settings::from_env();
    let device = match settings.device_config() {
        Ok(device) => device,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    spawn_flow_generator();

    let mut delay = TokioDelay;
    let mut led = LogIndicator;
    let mut supervisor =
        NetworkSupervisor::new(SimulatedLink::default(), HostClockSync, device.network);
    if let Err(err) = supervisor.connect(true, &mut delay).await {
        error!("Network connection failed: {}", err);
        std::process::exit(1);
    }
    runtime::flash_connected(&mut led, &mut delay).await;

    let state = AppState::new(&PULSES, Aggregator::new(SystemClock, device.utc_offset_hours));

    let address = (Ipv4Addr::LOCALHOST, settings.http_port);
    let mut listener = match tokio::net::TcpListener::bind(address).await {
        Ok(listener) => TokioListener { listener },
        Err(err) => {
            error!("Could not listen on port {}: {}", settings.http_port, err);
            std::process::exit(1);
        }
    };
    info!("Serving stats on http://127.0.0.1:{}/", settings.http_port);

    let mut sensor = SyntheticTemperature {
        start: Instant::now(),
    };
    runtime::run(
        &state,
        &mut supervisor,
        &mut listener,
        &mut sensor,
        &mut led,
        delay,
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_write_to_stalled_client_times_out() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let address = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(address), listener.accept());
        // Keep the client open but never read from it
        let _client = client.unwrap();
        let mut conn = TokioConnection(accepted.unwrap().0);

        let chunk = vec![0u8; 64 * 1024];
        let err = loop {
            if let Err(err) = conn.write(&chunk).await {
                break err;
            }
        };
        assert_eq!(embedded_io_async::Error::kind(&err), ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_close_sends_end_of_stream() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let address = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(address), listener.accept());
        let mut client = client.unwrap();
        let mut conn = TokioConnection(accepted.unwrap().0);

        conn.write_all(b"done").await.unwrap();
        conn.close().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"done");
    }
}
