//! SDL window showing the OLED (requires the `window` feature).

use std::thread;
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Receiver;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{BinaryColorTheme, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window};
use telemetry_common::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

use crate::frame::OledFrame;
use crate::tasks::FRAME_RECEIVERS;

/// Target frame time (~50 FPS).
pub const FRAME_TIME: Duration = Duration::from_millis(20);

/// Pixel scale of the window.
pub const SCALE: u32 = 6;

/// Run the window loop on the calling thread until the window is closed.
pub fn run(mut frames: Receiver<'static, CriticalSectionRawMutex, OledFrame, FRAME_RECEIVERS>) {
    let mut display: SimulatorDisplay<BinaryColor> = SimulatorDisplay::new(Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT));
    let output_settings = OutputSettingsBuilder::new()
        .scale(SCALE)
        .theme(BinaryColorTheme::OledBlue)
        .build();
    let mut window = Window::new("Telemetry OLED", &output_settings);

    loop {
        let frame_start = Instant::now();

        if let Some(frame) = frames.try_changed() {
            display.draw_iter(frame.pixels()).ok();
        }
        window.update(&display);

        if window.events().any(|ev| matches!(ev, SimulatorEvent::Quit)) {
            return;
        }

        if let Some(rest) = FRAME_TIME.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }
}
