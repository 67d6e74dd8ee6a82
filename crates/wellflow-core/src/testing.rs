//! Host-side fakes for the collaborator traits

use alloc::vec::Vec;
use core::cell::Cell;
use core::convert::Infallible;
use core::net::Ipv4Addr;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorType, Read, Write};

use crate::config::NetworkConfig;
use crate::network::{ClockSync, Link, LinkError, LinkStatus};
use crate::sensors::TemperatureSensor;
use crate::server::{Connection, Listener};
use crate::time_base::WallClock;

pub(crate) struct FakeClock {
    now: Cell<u64>,
}

impl FakeClock {
    pub(crate) fn new(now: u64) -> Self {
        Self { now: Cell::new(now) }
    }

    pub(crate) fn advance(&self, secs: u64) {
        self.now.set(self.now.get() + secs);
    }

    pub(crate) fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl WallClock for FakeClock {
    fn now_unix(&self) -> u64 {
        self.now.get()
    }
}

/// Delay that returns immediately and records every requested wait.
#[derive(Default, Clone)]
pub(crate) struct RecordingDelay {
    pub(crate) waits_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.waits_ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.push(ms);
    }
}

/// Indicator pin remembering every level it was driven to.
#[derive(Default)]
pub(crate) struct FakeIndicator {
    pub(crate) levels: Vec<bool>,
}

impl PinErrorType for FakeIndicator {
    type Error = Infallible;
}

impl OutputPin for FakeIndicator {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

/// Link whose status walks through a scripted sequence, repeating the last
/// entry once exhausted.
pub(crate) struct ScriptedLink {
    pub(crate) statuses: Vec<LinkStatus>,
    pub(crate) begin_result: Result<(), LinkError>,
    pub(crate) polls: usize,
    pub(crate) begins: usize,
    pub(crate) disconnects: usize,
}

impl ScriptedLink {
    pub(crate) fn new(statuses: &[LinkStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            begin_result: Ok(()),
            polls: 0,
            begins: 0,
            disconnects: 0,
        }
    }
}

impl Link for ScriptedLink {
    async fn begin(&mut self, _config: &NetworkConfig<'_>) -> Result<(), LinkError> {
        self.begins += 1;
        self.polls = 0;
        self.begin_result.clone()
    }

    fn status(&mut self) -> LinkStatus {
        let index = self.polls.min(self.statuses.len() - 1);
        self.polls += 1;
        self.statuses[index]
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 1, 40))
    }
}

#[derive(Default)]
pub(crate) struct CountingClockSync {
    pub(crate) syncs: usize,
    pub(crate) fail: bool,
}

impl ClockSync for CountingClockSync {
    async fn sync(&mut self) -> Result<(), LinkError> {
        self.syncs += 1;
        if self.fail {
            Err(LinkError::ClockSync)
        } else {
            Ok(())
        }
    }
}

pub(crate) struct FixedTemperature(pub(crate) Option<f32>);

impl TemperatureSensor for FixedTemperature {
    type Error = &'static str;

    async fn read(&mut self) -> Result<f32, Self::Error> {
        self.0.ok_or("sensor offline")
    }
}

/// In-memory connection: serves `input` in small chunks and captures output.
pub(crate) struct MockConnection<'a> {
    input: &'a [u8],
    chunk: usize,
    pub(crate) output: Vec<u8>,
    pub(crate) flushed: bool,
    pub(crate) closed: bool,
}

impl<'a> MockConnection<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            chunk: 7,
            output: Vec::new(),
            flushed: false,
            closed: false,
        }
    }

    pub(crate) fn output_str(&self) -> &str {
        core::str::from_utf8(&self.output).unwrap()
    }
}

impl ErrorType for MockConnection<'_> {
    type Error = Infallible;
}

impl Read for MockConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.chunk).min(self.input.len());
        buf[..n].copy_from_slice(&self.input[..n]);
        self.input = &self.input[n..];
        Ok(n)
    }
}

impl Write for MockConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushed = true;
        Ok(())
    }
}

impl Connection for MockConnection<'_> {
    async fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        Ok(())
    }
}

/// Listener handing out scripted connections in order. `None` entries fail
/// the accept; once the script runs out, accepting never completes.
pub(crate) struct ScriptedListener<'a> {
    script: Vec<Option<MockConnection<'static>>>,
    accepts: &'a Cell<usize>,
}

impl<'a> ScriptedListener<'a> {
    pub(crate) fn new(
        script: Vec<Option<MockConnection<'static>>>,
        accepts: &'a Cell<usize>,
    ) -> Self {
        Self { script, accepts }
    }

    pub(crate) fn connection(&self, index: usize) -> &MockConnection<'static> {
        self.script[index].as_ref().unwrap()
    }
}

impl Listener for ScriptedListener<'_> {
    type Connection<'c>
        = &'c mut MockConnection<'static>
    where
        Self: 'c;
    type Error = &'static str;

    async fn accept(&mut self) -> Result<&mut MockConnection<'static>, &'static str> {
        let index = self.accepts.get();
        self.accepts.set(index + 1);
        match self.script.get_mut(index) {
            Some(Some(conn)) => Ok(conn),
            Some(None) => Err("accept failed"),
            None => core::future::pending().await,
        }
    }
}
