//! In-memory OLED frame buffer and terminal presenter.

use std::convert::Infallible;
use std::io::{self, Write};

use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::Print;
use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use telemetry_common::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

const WIDTH: usize = DISPLAY_WIDTH as usize;

/// Terminal lines used by one frame (two pixel rows per character cell).
pub const TERMINAL_LINES: usize = (DISPLAY_HEIGHT as usize).div_ceil(2);

/// Screen rows taken by a framed OLED view.
pub const FRAME_ROWS: u16 = TERMINAL_LINES as u16 + 2;

const _: () = assert!(DISPLAY_HEIGHT <= u16::BITS);

/// 96x16 monochrome frame, one `u16` per column with bit `y` set for a lit pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OledFrame {
    columns: [u16; WIDTH],
}

impl OledFrame {
    pub const fn new() -> Self { Self { columns: [0; WIDTH] } }

    /// Whether the pixel at (`x`, `y`) is lit. Out-of-range is off.
    pub fn pixel(
        &self,
        x: u32,
        y: u32,
    ) -> bool {
        y < DISPLAY_HEIGHT
            && self
                .columns
                .get(x as usize)
                .is_some_and(|column| column & (1 << y) != 0)
    }

    /// Every pixel of the frame, lit or not.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        self.columns.iter().enumerate().flat_map(|(x, column)| {
            (0..DISPLAY_HEIGHT).map(move |y| {
                let color = if column & (1 << y) != 0 {
                    BinaryColor::On
                } else {
                    BinaryColor::Off
                };
                Pixel(Point::new(x as i32, y as i32), color)
            })
        })
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> u32 { self.columns.iter().map(|c| c.count_ones()).sum() }

    /// Render with half-block characters, one line per pixel-row pair.
    pub fn to_blocks(&self) -> String {
        let mut out = String::with_capacity(TERMINAL_LINES * (WIDTH * 3 + 1));
        for pair in 0..TERMINAL_LINES as u32 {
            let (upper_y, lower_y) = (pair * 2, pair * 2 + 1);
            for x in 0..DISPLAY_WIDTH {
                out.push(match (self.pixel(x, upper_y), self.pixel(x, lower_y)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            out.push('\n');
        }
        out
    }
}

impl Default for OledFrame {
    fn default() -> Self { Self::new() }
}

impl OriginDimensions for OledFrame {
    fn size(&self) -> Size { Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT) }
}

impl DrawTarget for OledFrame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(
        &mut self,
        pixels: I,
    ) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.y as u32 >= DISPLAY_HEIGHT {
                continue;
            }
            let Some(column) = self.columns.get_mut(point.x as usize) else {
                continue;
            };
            let mask = 1u16 << point.y;
            match color {
                BinaryColor::On => *column |= mask,
                BinaryColor::Off => *column &= !mask,
            }
        }
        Ok(())
    }

    fn clear(
        &mut self,
        color: Self::Color,
    ) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => u16::MAX,
            BinaryColor::Off => 0,
        };
        self.columns = [fill; WIDTH];
        Ok(())
    }
}

/// Draws frames into the rows reserved at the top of the terminal.
///
/// Holds the stdout lock while drawing so serial output is not interleaved
/// with the cursor commands.
#[derive(Debug, Default)]
pub struct TerminalScreen;

impl TerminalScreen {
    pub const fn new() -> Self { Self }

    pub fn present(
        &mut self,
        frame: &OledFrame,
    ) -> io::Result<()> {
        let _serial = io::stdout().lock();
        let mut err = io::stderr().lock();
        self.draw(&mut err, frame)?;
        err.flush()
    }

    /// Queue one frame at the top-left corner, leaving the cursor where it was.
    pub fn draw<W: Write>(
        &self,
        out: &mut W,
        frame: &OledFrame,
    ) -> io::Result<()> {
        let border: String = "─".repeat(WIDTH);
        queue!(out, SavePosition, MoveTo(0, 0), Print(format!("┌{border}┐")))?;
        for (row, line) in (1u16..).zip(frame.to_blocks().lines()) {
            queue!(out, MoveTo(0, row), Print(format!("│{line}│")))?;
        }
        queue!(out, MoveTo(0, FRAME_ROWS - 1), Print(format!("└{border}┘")), RestorePosition)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use telemetry_common::display::{DisplaySink, GraphicsSink};

    use super::*;

    #[test]
    fn test_draw_and_clear() {
        let mut frame = OledFrame::new();
        Pixel(Point::new(3, 15), BinaryColor::On).draw(&mut frame).unwrap();
        assert!(frame.pixel(3, 15));
        assert_eq!(frame.lit_count(), 1);

        frame.clear(BinaryColor::Off).unwrap();
        assert_eq!(frame.lit_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut frame = OledFrame::new();
        let pixels = [
            Pixel(Point::new(-1, 0), BinaryColor::On),
            Pixel(Point::new(96, 0), BinaryColor::On),
            Pixel(Point::new(0, 16), BinaryColor::On),
        ];
        frame.draw_iter(pixels).unwrap();
        assert_eq!(frame.lit_count(), 0);
        assert!(!frame.pixel(200, 0));
    }

    #[test]
    fn test_graphics_sink_pages() {
        let mut frame = OledFrame::new();
        GraphicsSink::new(&mut frame).draw_image(&[0xFF, 0x01], 10, 0, 1, 2);
        for y in 0..8 {
            assert!(frame.pixel(10, y));
        }
        assert!(frame.pixel(10, 8));
        assert!(!frame.pixel(10, 9));
    }

    #[test]
    fn test_blocks_layout() {
        let mut frame = OledFrame::new();
        frame
            .draw_iter([
                Pixel(Point::new(0, 0), BinaryColor::On),
                Pixel(Point::new(1, 1), BinaryColor::On),
                Pixel(Point::new(2, 0), BinaryColor::On),
                Pixel(Point::new(2, 1), BinaryColor::On),
            ])
            .unwrap();
        let blocks = frame.to_blocks();
        let lines: Vec<&str> = blocks.lines().collect();
        assert_eq!(lines.len(), TERMINAL_LINES);
        assert!(lines[0].starts_with("▀▄█ "));
        assert_eq!(lines[0].chars().count(), WIDTH);
    }

    #[test]
    fn test_screen_uses_absolute_moves_only() {
        let mut frame = OledFrame::new();
        Pixel(Point::new(5, 5), BinaryColor::On).draw(&mut frame).unwrap();

        let mut out = Vec::new();
        TerminalScreen::new().draw(&mut out, &frame).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\x1b7"));
        assert!(text.ends_with("\x1b8"));

        // Every CSI sequence is a cursor position (`H`) inside the frame rows.
        let mut rows = Vec::new();
        for sequence in text.split("\x1b[").skip(1) {
            let end = sequence.find(|c: char| c.is_ascii_alphabetic()).unwrap();
            assert_eq!(&sequence[end..=end], "H", "unexpected sequence {sequence:?}");
            let (row, column) = sequence[..end].split_once(';').unwrap();
            assert_eq!(column, "1");
            rows.push(row.parse::<u16>().unwrap());
        }
        assert_eq!(rows, (1..=FRAME_ROWS).collect::<Vec<_>>());
    }
}
