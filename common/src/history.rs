//! Fixed-capacity sample window.
//!
//! Slots are always in age order: inserting shifts every slot one position
//! towards the front and writes the new value into the last slot.

/// Oldest-first window of `N` values, zero-filled at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryBuffer<const N: usize> {
    slots: [u8; N],
}

impl<const N: usize> HistoryBuffer<N> {
    /// Create a window with every slot set to zero.
    pub const fn new() -> Self { Self { slots: [0; N] } }

    /// Append a value, evicting the oldest one.
    pub fn push(
        &mut self,
        value: u8,
    ) {
        if N == 0 {
            return;
        }
        self.slots.copy_within(1.., 0);
        self.slots[N - 1] = value;
    }

    /// Floor mean of the `count` most recent values.
    ///
    /// `count` is clamped into `[1, N]`, so a zero window can never divide by zero.
    pub fn average(
        &self,
        count: usize,
    ) -> u8 {
        if N == 0 {
            return 0;
        }
        let count = count.clamp(1, N);
        let sum: u32 = self.slots[N - count..].iter().map(|&v| u32::from(v)).sum();
        (sum / count as u32) as u8
    }

    /// Slots from oldest to newest.
    #[inline]
    pub fn as_slice(&self) -> &[u8] { &self.slots }

    /// Most recently pushed value.
    #[cfg(test)]
    pub fn latest(&self) -> Option<u8> { self.slots.last().copied() }

    /// Fixed capacity of the window.
    #[cfg(test)]
    pub const fn capacity(&self) -> usize { N }
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================
