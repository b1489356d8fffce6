//! Telemetry pipeline core shared by the firmware and the desktop simulator.
//!
//! A simulated sensor feeds a moving-average filter whose output drives a
//! scrolling waveform on a 96x16 monochrome display. An interactive serial
//! console retunes the filter window and toggles a periodic task/heap report.
//!
//! - [`config`]: Compile-time bounds and the runtime [`SharedConfig`]
//! - [`history`]: Fixed-capacity sample window
//! - [`source`]: Bounded random-walk sample generator
//! - [`filter`]: Moving-average stage
//! - [`waveform`]: Column rasterization and screen layout
//! - [`display`]: Display sink trait and embedded-graphics adapter
//! - [`format`]: printf-style serial formatter
//! - [`console`]: Command state machine
//! - [`report`]: Task and heap diagnostics table
//! - [`ticks`]: Run-time statistics clock
//!
//! Scheduling, timers and peripherals are provided by the caller; this crate
//! only holds the logic.
//!
//! # no_std Compatibility
//!
//! The crate is `no_std` outside of tests and never allocates.

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod filter;
pub mod format;
pub mod history;
pub mod report;
pub mod source;
pub mod ticks;
pub mod waveform;

// Re-export commonly used items
pub use config::SharedConfig;
pub use console::{CommandConsole, ReporterControl};
pub use display::{DisplaySink, GraphicsSink};
pub use error::ReportError;
pub use filter::MovingAverageFilter;
pub use format::{Arg, ByteSink, write_formatted};
pub use history::HistoryBuffer;
pub use report::{DiagnosticsReporter, SystemProbe};
pub use source::TelemetrySource;
pub use ticks::TickCounter;
pub use waveform::WaveformRenderer;
