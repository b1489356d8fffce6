//! Scrolling waveform rasterizer.
//!
//! Every averaged sample becomes a bar height (`sample / BAR_SCALE`) in a
//! [`GRAPH_COLUMNS`]-wide history. Each redraw turns the whole history into one
//! 16-bit pixel column per position:
//!
//! - the first column, and any column equal to its left neighbour, is a single
//!   dot at the bar height;
//! - otherwise a vertical run of `|h[i] - h[i-1]|` pixels starting at the lower
//!   of the two heights joins the two points.
//!
//! Bit `k` of the mathematical column is height `k` counted from the bottom.
//! The panel addresses pixels top-down, so the column is bit-reversed before it
//! is sent, low byte first (upper page first).
//!
//! ```text
//!  h: 3 3 5 2
//!     . . # .     height 4
//!     . . # #     height 3
//!     # # . #     height 2 ...
//! ```

use crate::config::{BAR_SCALE, GRAPH_COLUMNS, GRAPH_X};
use crate::display::DisplaySink;
use crate::history::HistoryBuffer;

/// Origin marker glyph: a small 4x4 circle on the lower page.
pub const ORIGIN_GLYPH: [u8; 4] = [0x70, 0x88, 0x88, 0x70];

/// Column of the origin marker.
pub const ORIGIN_X: u32 = 20;

/// Y-axis glyph: one full-height column.
pub const AXIS_GLYPH: [u8; 2] = [0xFF, 0xFF];

/// Column of the y axis.
pub const AXIS_X: u32 = 25;

/// Column of the `N=..` label.
pub const LABEL_X: u32 = 1;

/// Scale an averaged sample down to a bar height.
#[inline]
pub const fn bar_height(average: u8) -> u8 { average / BAR_SCALE }

/// Build the un-reversed pixel column for position `current` given its left
/// neighbour (`None` for the first column).
pub fn raster_column(
    previous: Option<u8>,
    current: u8,
) -> u16 {
    let current = current.min(15);
    match previous.map(|p| p.min(15)) {
        Some(previous) if previous != current => {
            let run = u32::from(current.abs_diff(previous));
            let base = current.min(previous);
            let mask = (1u32 << run) - 1;
            (mask << base) as u16
        }
        _ => 1 << current,
    }
}

/// Mirror a column so bit 0 becomes bit 15 and vice versa.
#[inline]
pub const fn mirror_column(column: u16) -> u16 {
    let mut col = column;
    col = ((col >> 1) & 0x5555) | ((col << 1) & 0xAAAA);
    col = ((col >> 2) & 0x3333) | ((col << 2) & 0xCCCC);
    col = ((col >> 4) & 0x0F0F) | ((col << 4) & 0xF0F0);
    col = ((col >> 8) & 0x00FF) | ((col << 8) & 0xFF00);
    col
}

/// Render the window size as the two-digit `N=..` label.
pub fn window_label(window: u8) -> [u8; 4] {
    let window = window.min(99);
    [b'N', b'=', b'0' + window / 10, b'0' + window % 10]
}

/// Waveform display stage.
#[derive(Clone, Debug, Default)]
pub struct WaveformRenderer {
    heights: HistoryBuffer<GRAPH_COLUMNS>,
}

impl WaveformRenderer {
    pub const fn new() -> Self {
        Self {
            heights: HistoryBuffer::new(),
        }
    }

    /// Record a new averaged sample.
    pub fn push(
        &mut self,
        average: u8,
    ) {
        self.heights.push(bar_height(average));
    }

    /// Bar heights currently on screen, oldest (leftmost) first.
    pub fn heights(&self) -> &[u8] { self.heights.as_slice() }

    /// Iterate over the mirrored columns, left to right.
    pub fn columns(&self) -> impl Iterator<Item = u16> + '_ {
        let heights = self.heights.as_slice();
        heights.iter().enumerate().map(move |(i, &h)| {
            let previous = if i == 0 { None } else { Some(heights[i - 1]) };
            mirror_column(raster_column(previous, h))
        })
    }

    /// Redraw the full screen: label, origin marker, axis and every column.
    pub fn draw<S: DisplaySink>(
        &self,
        window: u8,
        sink: &mut S,
    ) {
        sink.clear();

        let label = window_label(window);
        // Label bytes are ASCII by construction.
        if let Ok(text) = core::str::from_utf8(&label) {
            sink.draw_string(text, LABEL_X, 0);
        }
        sink.draw_image(&ORIGIN_GLYPH, ORIGIN_X, 1, ORIGIN_GLYPH.len() as u32, 1);
        sink.draw_image(&AXIS_GLYPH, AXIS_X, 0, 1, 2);

        for (i, column) in self.columns().enumerate() {
            sink.draw_image(&column.to_le_bytes(), GRAPH_X + i as u32, 0, 1, 2);
        }
    }

    /// Push a sample and redraw, as done once per renderer cycle.
    pub fn update<S: DisplaySink>(
        &mut self,
        average: u8,
        window: u8,
        sink: &mut S,
    ) {
        self.push(average);
        self.draw(window, sink);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use heapless::{String, Vec};

    use super::*;

    /// Records every draw call.
    #[derive(Default)]
    struct RecordingSink {
        clears: usize,
        text: String<16>,
        images: Vec<(u32, u32, Vec<u8, 4>), 96>,
    }

    impl DisplaySink for RecordingSink {
        fn clear(&mut self) {
            self.clears += 1;
            self.text.clear();
            self.images.clear();
        }

        fn draw_string(
            &mut self,
            text: &str,
            _x: u32,
            _page: u32,
        ) {
            self.text.push_str(text).ok();
        }

        fn draw_image(
            &mut self,
            image: &[u8],
            x: u32,
            page: u32,
            _width: u32,
            _pages: u32,
        ) {
            let bytes = Vec::from_slice(image).unwrap();
            self.images.push((x, page, bytes)).unwrap();
        }
    }

    #[test]
    fn test_first_column_is_single_dot() {
        assert_eq!(raster_column(None, 0), 0x0001);
        assert_eq!(raster_column(None, 7), 0x0080);
        assert_eq!(raster_column(None, 15), 0x8000);
    }

    #[test]
    fn test_flat_segment_is_dot() {
        assert_eq!(raster_column(Some(4), 4), 1 << 4);
    }

    #[test]
    fn test_rising_and_falling_runs() {
        // From 2 up to 5: three bits starting at 2
        assert_eq!(raster_column(Some(2), 5), 0b0001_1100);
        // From 5 down to 2: same run
        assert_eq!(raster_column(Some(5), 2), 0b0001_1100);
        // Full swing
        assert_eq!(raster_column(Some(0), 15), 0x7FFF);
    }

    #[test]
    fn test_increasing_sequence_bit_counts() {
        let heights = [0u8, 1, 3, 6, 10, 15];
        assert_eq!(raster_column(None, heights[0]).count_ones(), 1);
        for i in 1..heights.len() {
            let col = raster_column(Some(heights[i - 1]), heights[i]);
            assert_eq!(col.count_ones(), u32::from(heights[i] - heights[i - 1]));
        }
    }

    #[test]
    fn test_mirror_column() {
        assert_eq!(mirror_column(0x0001), 0x8000);
        assert_eq!(mirror_column(0x8000), 0x0001);
        assert_eq!(mirror_column(0x00F0), 0x0F00);
        assert_eq!(mirror_column(0xA5C3), 0xC3A5);
        assert_eq!(mirror_column(mirror_column(0x1234)), 0x1234);
    }

    #[test]
    fn test_window_label() {
        assert_eq!(&window_label(5), b"N=05");
        assert_eq!(&window_label(20), b"N=20");
    }

    #[test]
    fn test_bar_height_scaling() {
        assert_eq!(bar_height(0), 0);
        assert_eq!(bar_height(9), 0);
        assert_eq!(bar_height(75), 7);
        assert_eq!(bar_height(150), 15);
    }

    #[test]
    fn test_draw_emits_full_frame() {
        let mut renderer = WaveformRenderer::new();
        let mut sink = RecordingSink::default();
        renderer.update(150, 12, &mut sink);

        assert_eq!(sink.clears, 1);
        assert_eq!(sink.text.as_str(), "N=12");
        // origin + axis + one image per graph column
        assert_eq!(sink.images.len(), 2 + GRAPH_COLUMNS);
        assert_eq!(sink.images[0].0, ORIGIN_X);
        assert_eq!(sink.images[1].0, AXIS_X);

        // Leftmost column is a dot at height 0 -> bottom pixel -> bit 7 of the lower page.
        let (x, _, first) = &sink.images[2];
        assert_eq!(*x, GRAPH_X);
        assert_eq!(first.as_slice(), &[0x00, 0x80]);

        // Newest column joins height 0 to height 15: every pixel except the top one.
        let (x, _, last) = &sink.images[sink.images.len() - 1];
        assert_eq!(*x, GRAPH_X + GRAPH_COLUMNS as u32 - 1);
        assert_eq!(u16::from_le_bytes([last[0], last[1]]), mirror_column(0x7FFF));
        assert_eq!(last.as_slice(), &[0xFE, 0xFF]);
    }

    #[test]
    fn test_history_scrolls() {
        let mut renderer = WaveformRenderer::new();
        for v in [10, 20, 30] {
            renderer.push(v);
        }
        let heights = renderer.heights();
        assert_eq!(&heights[GRAPH_COLUMNS - 3..], &[1, 2, 3]);
        assert_eq!(renderer.columns().count(), GRAPH_COLUMNS);
    }
}
