//! Free-running overflow counter used as the run-time statistics clock.
//!
//! A periodic timer interrupt bumps the counter every [`OVERFLOW_TICK_US`]
//! microseconds. The counter wraps at 2^32, so every interval measurement goes
//! through [`ticks_between`], which uses modular subtraction.
//!
//! [`OVERFLOW_TICK_US`]: crate::config::OVERFLOW_TICK_US

use core::sync::atomic::{AtomicU32, Ordering};

/// 32-bit wrapping tick counter.
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self { Self::starting_at(0) }

    /// Counter preset to `start` (useful to exercise wraparound).
    pub const fn starting_at(start: u32) -> Self {
        Self {
            ticks: AtomicU32::new(start),
        }
    }

    /// Advance by one tick.
    #[cfg(test)]
    pub fn tick(&self) { self.advance(1); }

    /// Advance by `ticks`, wrapping at 2^32.
    #[inline]
    pub fn advance(
        &self,
        ticks: u32,
    ) {
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Current counter value.
    #[inline]
    pub fn now(&self) -> u32 { self.ticks.load(Ordering::Relaxed) }
}

impl Default for TickCounter {
    fn default() -> Self { Self::new() }
}

/// Ticks elapsed from `previous` to `current`, modulo 2^32.
#[inline]
pub const fn ticks_between(
    previous: u32,
    current: u32,
) -> u32 {
    current.wrapping_sub(previous)
}
