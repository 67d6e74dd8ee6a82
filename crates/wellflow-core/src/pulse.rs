//! Flow sensor pulse counting

use core::sync::atomic::{AtomicU32, Ordering};

/// Monotonic count of rising edges seen on the flow sensor line.
///
/// The sensor interrupt is the only writer and performs a single relaxed
/// atomic add per edge, so it never blocks and never takes a lock. Every
/// other reader gets a best-effort snapshot that may trail the hardware by
/// an edge. The count starts at zero when the device boots and only ever
/// grows (wrapping after `u32::MAX` edges; deltas use wrapping arithmetic).
pub struct PulseCounter {
    count: AtomicU32,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Record one edge. Safe to call from interrupt context.
    #[inline]
    pub fn on_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}
