//! Simulated temperature sensor.
//!
//! Produces a bounded random walk: each new sample is drawn uniformly from
//! `[current - SAMPLE_STEP, current + SAMPLE_STEP]`, clamped to the sample
//! domain. The generator is a 32-bit xorshift, which has a single absorbing
//! state (zero); the source never lets it get there.

use crate::config::{SAMPLE_INITIAL, SAMPLE_MAX, SAMPLE_MIN, SAMPLE_STEP};

/// xorshift32 pseudo-random generator (13/17/5 triple).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Seed the generator. A zero seed is replaced by 1.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Advance the generator and return the new state.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        if x == 0 {
            x = 1;
        }
        self.state = x;
        x
    }
}

/// Random-walk sample generator.
#[derive(Clone, Debug)]
pub struct TelemetrySource {
    rng: Xorshift32,
    current: u8,
}

impl TelemetrySource {
    /// Create a source starting at the middle of the sample domain.
    pub const fn new(seed: u32) -> Self {
        Self {
            rng: Xorshift32::new(seed),
            current: SAMPLE_INITIAL,
        }
    }

    /// Last produced sample (or the initial value before the first cycle).
    #[inline]
    pub const fn current(&self) -> u8 { self.current }

    /// Produce the next sample of the walk.
    pub fn next_sample(&mut self) -> u8 {
        let (lower, upper) = step_bounds(self.current);
        let span = u32::from(upper - lower) + 1;
        self.current = lower + (self.rng.next_u32() % span) as u8;
        self.current
    }
}

/// Inclusive range reachable from `current` in one step.
pub const fn step_bounds(current: u8) -> (u8, u8) {
    let lower = if current > SAMPLE_MIN + SAMPLE_STEP {
        current - SAMPLE_STEP
    } else {
        SAMPLE_MIN
    };
    let upper = if current < SAMPLE_MAX - SAMPLE_STEP {
        current + SAMPLE_STEP
    } else {
        SAMPLE_MAX
    };
    (lower, upper)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_is_replaced() {
        let mut rng = Xorshift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_known_sequence() {
        // Reference values of xorshift32 seeded with 1.
        let mut rng = Xorshift32::new(1);
        assert_eq!(rng.next_u32(), 270_369);
        assert_eq!(rng.next_u32(), 67_634_689);
    }

    #[test]
    fn test_step_bounds_clamp() {
        assert_eq!(step_bounds(75), (45, 105));
        assert_eq!(step_bounds(10), (0, 40));
        assert_eq!(step_bounds(140), (110, 150));
        assert_eq!(step_bounds(0), (0, 30));
        assert_eq!(step_bounds(150), (120, 150));
    }

    #[test]
    fn test_walk_stays_in_domain_and_step() {
        for seed in [1u32, 0xDEAD_BEEF, 12_345, u32::MAX] {
            let mut source = TelemetrySource::new(seed);
            let mut previous = source.current();
            for _ in 0..1000 {
                let sample = source.next_sample();
                assert!(sample <= SAMPLE_MAX);
                assert!(sample.abs_diff(previous) <= SAMPLE_STEP);
                previous = sample;
            }
        }
    }

    #[test]
    fn test_same_seed_same_walk() {
        let mut a = TelemetrySource::new(99);
        let mut b = TelemetrySource::new(99);
        for _ in 0..50 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }
}
