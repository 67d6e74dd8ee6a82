//! Wall-clock access and local day boundary detection

const SECONDS_PER_HOUR: u64 = 3600;
const HOURS_PER_DAY: i16 = 24;

/// Source of the current wall-clock time as seconds since the Unix epoch.
///
/// Second resolution is enough; nothing here looks below the hour.
pub trait WallClock {
    fn now_unix(&self) -> u64;
}

impl<T: WallClock + ?Sized> WallClock for &T {
    fn now_unix(&self) -> u64 {
        (**self).now_unix()
    }
}

/// Local hour (0..=23) for a Unix timestamp shifted by a fixed UTC offset.
pub fn local_hour_at(unix_secs: u64, utc_offset_hours: i8) -> u8 {
    let utc_hour = ((unix_secs / SECONDS_PER_HOUR) % HOURS_PER_DAY as u64) as i16;
    (utc_hour + i16::from(utc_offset_hours)).rem_euclid(HOURS_PER_DAY) as u8
}

/// Wall clock normalized to local time, with day rollover detection.
pub struct TimeBase<C> {
    clock: C,
    utc_offset_hours: i8,
    /// Last observed local hour, `None` until the first observation
    last_hour: Option<u8>,
}

impl<C: WallClock> TimeBase<C> {
    pub fn new(clock: C, utc_offset_hours: i8) -> Self {
        Self {
            clock,
            utc_offset_hours,
            last_hour: None,
        }
    }

    pub fn now_unix(&self) -> u64 {
        self.clock.now_unix()
    }

    pub fn local_hour(&self) -> u8 {
        local_hour_at(self.clock.now_unix(), self.utc_offset_hours)
    }

    /// Returns `true` once when the local hour changes to midnight.
    ///
    /// Each distinct hour transition is reported at most once no matter how
    /// often this is polled. The very first observation only records the
    /// hour: there is no previous hour to transition from.
    pub fn day_rolled_over(&mut self) -> bool {
        let hour = self.local_hour();
        match self.last_hour.replace(hour) {
            Some(previous) => previous != hour && hour == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;

    // 2024-01-01T00:00:00Z
    const NEW_YEAR_UTC: u64 = 1_704_067_200;

    #[test]
    fn test_local_hour_applies_offset() {
        assert_eq!(local_hour_at(NEW_YEAR_UTC, 0), 0);
        assert_eq!(local_hour_at(NEW_YEAR_UTC, -7), 17);
        assert_eq!(local_hour_at(NEW_YEAR_UTC + 3 * 3600, 14), 17);
        assert_eq!(local_hour_at(NEW_YEAR_UTC + 23 * 3600 + 3599, 0), 23);
    }

    #[test]
    fn test_first_observation_never_rolls() {
        let clock = FakeClock::new(NEW_YEAR_UTC);
        let mut time = TimeBase::new(&clock, 0);
        assert_eq!(time.local_hour(), 0);
        assert!(!time.day_rolled_over());
    }

    #[test]
    fn test_rolls_once_per_midnight_with_coarse_polling() {
        let clock = FakeClock::new(NEW_YEAR_UTC + 12 * 3600);
        let mut time = TimeBase::new(&clock, -7);

        let mut rollovers = 0;
        // Three days polled once a minute
        for _ in 0..(3 * 24 * 60) {
            if time.day_rolled_over() {
                assert_eq!(time.local_hour(), 0);
                rollovers += 1;
            }
            clock.advance(60);
        }
        assert_eq!(rollovers, 3);
    }

    #[test]
    fn test_repeated_polls_in_midnight_hour_report_once() {
        let clock = FakeClock::new(NEW_YEAR_UTC - 60);
        let mut time = TimeBase::new(&clock, 0);
        assert!(!time.day_rolled_over());

        clock.advance(60);
        assert!(time.day_rolled_over());
        for _ in 0..59 {
            clock.advance(1);
            assert!(!time.day_rolled_over());
        }
    }

    #[test]
    fn test_jump_to_midnight_from_any_hour_rolls() {
        let clock = FakeClock::new(NEW_YEAR_UTC + 5 * 3600);
        let mut time = TimeBase::new(&clock, 0);
        assert!(!time.day_rolled_over());

        // Clock sync moving time forward straight into midnight
        clock.set(NEW_YEAR_UTC + 24 * 3600);
        assert!(time.day_rolled_over());
    }
}
