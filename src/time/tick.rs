//! System tick counting.

use super::{Duration, Timeout};
use portable_atomic::{AtomicU64, Ordering};

/// Monotonic tick counter advanced by the port's tick source.
#[derive(Debug)]
pub(crate) struct TickCounter {
    /// Number of ticks since boot
    ticks: AtomicU64,
    /// Tick frequency in Hz
    frequency: u32,
}

impl TickCounter {
    pub(crate) const fn new(frequency: u32) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            frequency,
        }
    }

    /// Advance by `n` ticks and return the new count.
    pub(crate) fn announce(&self, n: u32) -> u64 {
        self.ticks.fetch_add(n as u64, Ordering::AcqRel) + n as u64
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn frequency(&self) -> u32 {
        self.frequency
    }

    pub(crate) fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let nanos = ticks as u128 * 1_000_000_000 / self.frequency as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    /// Convert a duration to a timeout, rounding up to whole ticks.
    ///
    /// Zero maps to `NoWait`; durations past `u32::MAX` ticks saturate.
    pub(crate) fn timeout_for(&self, duration: Duration) -> Timeout {
        let nanos = duration.as_nanos();
        if nanos == 0 {
            return Timeout::NoWait;
        }
        let ticks = (nanos * self.frequency as u128 + 999_999_999) / 1_000_000_000;
        Timeout::Ticks(ticks.min(u32::MAX as u128) as u32)
    }
}
