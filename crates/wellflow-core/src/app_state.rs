//! Application-wide shared state for wellflow
//!
//! One [`AppState`] is built at startup and handed by reference to every
//! runtime task. Field ownership:
//!
//! - the pulse count is written only by the sensor interrupt (atomic add) and
//!   read everywhere else;
//! - the [`Aggregator`] is mutated only by the tick task (samples, rollover)
//!   and the HTTP task (calibration), always inside one synchronous lock
//!   section, so no aggregator operation is ever interrupted by a yield.
//!
//! All tasks share one executor, so the lock is a [`NoopRawMutex`]: it never
//! masks interrupts and the flow sensor edge handler keeps running while the
//! aggregator is borrowed. The state is therefore not `Sync`.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use crate::aggregator::{Aggregator, StatsSnapshot};
use crate::config::ConfigError;
use crate::pulse::PulseCounter;
use crate::time_base::WallClock;

pub type AggregatorCell<C> = Mutex<NoopRawMutex, RefCell<Aggregator<C>>>;

pub struct AppState<'a, C> {
    pulses: &'a PulseCounter,
    aggregator: AggregatorCell<C>,
}

impl<'a, C: WallClock> AppState<'a, C> {
    pub fn new(pulses: &'a PulseCounter, aggregator: Aggregator<C>) -> Self {
        Self {
            pulses,
            aggregator: Mutex::new(RefCell::new(aggregator)),
        }
    }

    pub fn pulses(&self) -> u32 {
        self.pulses.snapshot()
    }

    /// Minute sample followed by the day rollover check, against one count.
    pub fn tick(&self) {
        let pulses = self.pulses();
        self.with_aggregator(|aggregator| aggregator.tick(pulses));
    }

    pub fn set_calibration(&self, raw: &str) -> Result<(), ConfigError> {
        self.with_aggregator(|aggregator| aggregator.set_calibration(raw))
    }

    pub fn snapshot(&self, temperature_c: Option<f32>) -> StatsSnapshot {
        let pulses = self.pulses();
        self.with_aggregator(|aggregator| aggregator.snapshot(pulses, temperature_c))
    }

    fn with_aggregator<R>(&self, f: impl FnOnce(&mut Aggregator<C>) -> R) -> R {
        self.aggregator.lock(|cell| f(&mut cell.borrow_mut()))
    }
}
