//! Moving-average filter stage.

use crate::config::FILTER_HISTORY;
use crate::history::HistoryBuffer;

/// Keeps the last [`FILTER_HISTORY`] samples and averages the newest `window`.
#[derive(Clone, Debug, Default)]
pub struct MovingAverageFilter {
    history: HistoryBuffer<FILTER_HISTORY>,
}

impl MovingAverageFilter {
    pub const fn new() -> Self {
        Self {
            history: HistoryBuffer::new(),
        }
    }

    /// Feed one sample and return the floor mean of the `window` newest samples.
    ///
    /// `window` is read by the caller once per cycle from the shared config.
    pub fn process(
        &mut self,
        sample: u8,
        window: u8,
    ) -> u8 {
        self.history.push(sample);
        self.history.average(usize::from(window))
    }

    /// Samples currently held, oldest first.
    pub fn history(&self) -> &[u8] { self.history.as_slice() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_converges() {
        let mut filter = MovingAverageFilter::new();
        let mut out = 0;
        for _ in 0..FILTER_HISTORY {
            out = filter.process(80, 20);
        }
        assert_eq!(out, 80);
    }

    #[test]
    fn test_window_of_one_passes_through() {
        let mut filter = MovingAverageFilter::new();
        assert_eq!(filter.process(17, 1), 17);
        assert_eq!(filter.process(140, 1), 140);
    }

    #[test]
    fn test_zero_history_pulls_average_down() {
        let mut filter = MovingAverageFilter::new();
        // One real sample, nine zero slots.
        assert_eq!(filter.process(100, 10), 10);
    }

    #[test]
    fn test_window_change_between_cycles() {
        let mut filter = MovingAverageFilter::new();
        for v in [10, 20, 30, 40] {
            filter.process(v, 4);
        }
        assert_eq!(filter.process(50, 2), 45);
        assert_eq!(filter.process(60, 5), 40);
        assert_eq!(filter.history().len(), FILTER_HISTORY);
    }
}
