//! Per-minute and per-day flow statistics
//!
//! The [`Aggregator`] turns raw [`PulseCounter`](crate::pulse::PulseCounter)
//! snapshots into a per-minute rate and a seven day history. It is driven by
//! the runtime's 60 second tick:
//!
//! 1. [`Aggregator::sample_minute`] computes the edges seen since the previous
//!    tick.
//! 2. [`Aggregator::maybe_roll_day`] asks the [`TimeBase`] whether local
//!    midnight has passed and, if so, closes out the day.
//!
//! Volumes are derived on demand from the current [`Calibration`], so a
//! calibration change re-scales all history immediately.

use core::str::FromStr;

use log::info;

use crate::config::ConfigError;
use crate::time_base::{TimeBase, WallClock};

/// Number of days kept in [`DailyHistory`].
pub const HISTORY_DAYS: usize = 7;

/// Display name of the volume unit the calibration converts edges into.
pub const VOLUME_UNIT: &str = "gallons";

/// Flow sensor edges per unit of volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration(u32);

impl Calibration {
    pub const MIN: u32 = 2500;
    pub const MAX: u32 = 3500;
    pub const DEFAULT: Self = Self(3028);

    pub const fn ticks_per_unit(self) -> u32 {
        self.0
    }

    /// Convert an edge count into volume units.
    pub fn volume(self, ticks: u32) -> f32 {
        ticks as f32 / self.0 as f32
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Calibration {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::OutOfRange {
                value: value.into(),
                min: Self::MIN.into(),
                max: Self::MAX.into(),
            })
        }
    }
}

impl FromStr for Calibration {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value: u32 = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::not_a_number(raw))?;
        Self::try_from(value)
    }
}

/// Edge counts for the last [`HISTORY_DAYS`] local days, oldest first.
///
/// Slots hold `None` until a full day has been recorded into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyHistory {
    days: [Option<u32>; HISTORY_DAYS],
}

impl DailyHistory {
    pub const fn new() -> Self {
        Self {
            days: [None; HISTORY_DAYS],
        }
    }

    /// Drop the oldest day and append `ticks` as the newest.
    pub fn push(&mut self, ticks: u32) {
        self.days.rotate_left(1);
        self.days[HISTORY_DAYS - 1] = Some(ticks);
    }

    pub fn newest(&self) -> Option<u32> {
        self.days[HISTORY_DAYS - 1]
    }

    /// Days ordered oldest to newest.
    pub fn days(&self) -> &[Option<u32>; HISTORY_DAYS] {
        &self.days
    }
}

impl Default for DailyHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of everything the stats page shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub pulses: u32,
    pub calibration: Calibration,
    pub minute_rate: Option<u32>,
    pub history: DailyHistory,
    pub now_unix: u64,
    pub started_unix: u64,
    /// Device temperature in °C, `None` if the sensor could not be read
    pub temperature_c: Option<f32>,
}

impl StatsSnapshot {
    pub fn volume(&self, ticks: u32) -> f32 {
        self.calibration.volume(ticks)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.now_unix.saturating_sub(self.started_unix)
    }
}

pub struct Aggregator<C> {
    time: TimeBase<C>,
    calibration: Calibration,
    started_unix: u64,
    minute_baseline: Option<u32>,
    minute_rate: Option<u32>,
    /// Pulse count at the last day boundary, `None` until seeded
    day_baseline: Option<u32>,
    history: DailyHistory,
}

impl<C: WallClock> Aggregator<C> {
    /// Create an aggregator, capturing the run start time from `clock`.
    pub fn new(clock: C, utc_offset_hours: i8) -> Self {
        let time = TimeBase::new(clock, utc_offset_hours);
        Self {
            started_unix: time.now_unix(),
            time,
            calibration: Calibration::DEFAULT,
            minute_baseline: None,
            minute_rate: None,
            day_baseline: None,
            history: DailyHistory::new(),
        }
    }

    /// Record the edges seen since the previous sample.
    ///
    /// The first call only establishes the baseline and yields `None`.
    pub fn sample_minute(&mut self, pulses: u32) -> Option<u32> {
        self.minute_rate = self
            .minute_baseline
            .replace(pulses)
            .map(|previous| pulses.wrapping_sub(previous));

        if let Some(rate) = self.minute_rate {
            info!(
                "Minute sample: {} ticks ({:.2} {})",
                rate,
                self.calibration.volume(rate),
                VOLUME_UNIT
            );
        }
        self.minute_rate
    }

    /// Close out the day if local midnight has passed since the last check.
    ///
    /// The first call seeds the history: the newest slot becomes `0` and the
    /// current count becomes the day baseline. Returns `true` whenever the
    /// history shifted.
    pub fn maybe_roll_day(&mut self, pulses: u32) -> bool {
        let Some(baseline) = self.day_baseline else {
            // Prime the hour tracker so the next midnight is detected
            self.time.day_rolled_over();
            self.history.push(0);
            self.day_baseline = Some(pulses);
            info!("Daily history seeded at {} ticks", pulses);
            return true;
        };

        if !self.time.day_rolled_over() {
            return false;
        }

        let day_ticks = pulses.wrapping_sub(baseline);
        self.history.push(day_ticks);
        self.day_baseline = Some(pulses);
        info!(
            "Day rolled over: {} ticks ({:.1} {})",
            day_ticks,
            self.calibration.volume(day_ticks),
            VOLUME_UNIT
        );
        true
    }

    /// One scheduler tick: minute sample first, then the day check.
    pub fn tick(&mut self, pulses: u32) {
        self.sample_minute(pulses);
        self.maybe_roll_day(pulses);
    }

    /// Parse and apply a new calibration. State is untouched on error.
    pub fn set_calibration(&mut self, raw: &str) -> Result<(), ConfigError> {
        let calibration: Calibration = raw.parse()?;
        info!(
            "Calibration changed from {} to {} ticks per unit",
            self.calibration.ticks_per_unit(),
            calibration.ticks_per_unit()
        );
        self.calibration = calibration;
        Ok(())
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn minute_rate(&self) -> Option<u32> {
        self.minute_rate
    }

    pub fn history(&self) -> &DailyHistory {
        &self.history
    }

    pub fn started_unix(&self) -> u64 {
        self.started_unix
    }

    pub fn snapshot(&self, pulses: u32, temperature_c: Option<f32>) -> StatsSnapshot {
        StatsSnapshot {
            pulses,
            calibration: self.calibration,
            minute_rate: self.minute_rate,
            history: self.history,
            now_unix: self.time.now_unix(),
            started_unix: self.started_unix,
            temperature_c,
        }
    }
}
