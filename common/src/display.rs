//! Display output abstraction for the 96x16 OLED.
//!
//! The panel is organised in two 8-pixel pages. Images are sequences of
//! vertical byte columns, page by page, with bit 0 at the top of each page.
//! [`DisplaySink`] mirrors the three driver calls the renderer needs;
//! [`GraphicsSink`] implements them on top of any embedded-graphics
//! [`DrawTarget`] so the same renderer can drive a real panel, the simulator
//! frame buffer or an SDL window.

use embedded_graphics::Pixel;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

/// Height of one display page in pixels.
pub const PAGE_HEIGHT: u32 = 8;

/// Text style matching the panel's 5x7 character cell.
pub const TEXT_STYLE: MonoTextStyle<'static, BinaryColor> = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);

/// Page-addressed monochrome display.
pub trait DisplaySink {
    /// Blank the whole panel.
    fn clear(&mut self);

    /// Draw ASCII text with its top-left corner at column `x`, page `page`.
    fn draw_string(
        &mut self,
        text: &str,
        x: u32,
        page: u32,
    );

    /// Draw a `width` x `pages` byte-column image at column `x`, page `page`.
    ///
    /// `image` holds `width` bytes per page, first page first.
    fn draw_image(
        &mut self,
        image: &[u8],
        x: u32,
        page: u32,
        width: u32,
        pages: u32,
    );
}

/// [`DisplaySink`] over an embedded-graphics draw target.
pub struct GraphicsSink<'a, D> {
    target: &'a mut D,
}

impl<'a, D> GraphicsSink<'a, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    pub fn new(target: &'a mut D) -> Self { Self { target } }
}

impl<D> DisplaySink for GraphicsSink<'_, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    fn clear(&mut self) { self.target.clear(BinaryColor::Off).ok(); }

    fn draw_string(
        &mut self,
        text: &str,
        x: u32,
        page: u32,
    ) {
        let origin = Point::new(x as i32, (page * PAGE_HEIGHT) as i32);
        Text::with_baseline(text, origin, TEXT_STYLE, Baseline::Top)
            .draw(self.target)
            .ok();
    }

    fn draw_image(
        &mut self,
        image: &[u8],
        x: u32,
        page: u32,
        width: u32,
        pages: u32,
    ) {
        let pixels = (0..pages).flat_map(move |p| {
            (0..width).flat_map(move |c| {
                let byte = image.get((p * width + c) as usize).copied().unwrap_or(0);
                (0..PAGE_HEIGHT).map(move |bit| {
                    let point = Point::new((x + c) as i32, ((page + p) * PAGE_HEIGHT + bit) as i32);
                    let color = if byte & (1 << bit) != 0 {
                        BinaryColor::On
                    } else {
                        BinaryColor::Off
                    };
                    Pixel(point, color)
                })
            })
        });
        self.target.draw_iter(pixels).ok();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use embedded_graphics::mock_display::MockDisplay;

    use super::*;

    #[test]
    fn test_image_bit_zero_is_top_of_page() {
        let mut display: MockDisplay<BinaryColor> = MockDisplay::new();
        {
            let mut sink = GraphicsSink::new(&mut display);
            sink.draw_image(&[0x01, 0x80], 0, 0, 1, 2);
        }
        assert_eq!(display.get_pixel(Point::new(0, 0)), Some(BinaryColor::On));
        assert_eq!(display.get_pixel(Point::new(0, 1)), Some(BinaryColor::Off));
        assert_eq!(display.get_pixel(Point::new(0, 15)), Some(BinaryColor::On));
        assert_eq!(display.get_pixel(Point::new(0, 8)), Some(BinaryColor::Off));
    }

    #[test]
    fn test_wide_image_layout() {
        let mut display: MockDisplay<BinaryColor> = MockDisplay::new();
        {
            let mut sink = GraphicsSink::new(&mut display);
            sink.draw_image(&[0x70, 0x88, 0x88, 0x70], 2, 1, 4, 1);
        }
        // 0x70 -> bits 4..6 set on page 1
        assert_eq!(display.get_pixel(Point::new(2, 12)), Some(BinaryColor::On));
        assert_eq!(display.get_pixel(Point::new(2, 11)), Some(BinaryColor::Off));
        // 0x88 -> bits 3 and 7
        assert_eq!(display.get_pixel(Point::new(3, 11)), Some(BinaryColor::On));
        assert_eq!(display.get_pixel(Point::new(3, 15)), Some(BinaryColor::On));
    }
}
