//! Compile-time bounds and the runtime shared configuration.
//!
//! All sizing and timing decisions are `const` so that buffers can be
//! statically sized. The only mutable state shared between tasks is
//! [`SharedConfig`], which the command console writes and everyone else reads.
//!
//! # Atomicity
//!
//! The console runs in the byte-arrival context and can preempt any task, so
//! both fields are atomics. Readers never wait for the writer.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// =============================================================================
// Sample Domain
// =============================================================================

/// Lowest sample value (deci-degrees).
pub const SAMPLE_MIN: u8 = 0;

/// Highest sample value (deci-degrees).
pub const SAMPLE_MAX: u8 = 150;

/// Sample value the source starts its random walk from.
pub const SAMPLE_INITIAL: u8 = (SAMPLE_MAX + SAMPLE_MIN) / 2;

/// Maximum distance between two consecutive samples.
pub const SAMPLE_STEP: u8 = 30;

const _: () = assert!(SAMPLE_MIN < SAMPLE_MAX);
const _: () = assert!(SAMPLE_STEP > 0 && SAMPLE_STEP <= SAMPLE_MAX - SAMPLE_MIN);

// =============================================================================
// Filter Window
// =============================================================================

/// Smallest accepted averaging window.
pub const WINDOW_MIN: u8 = 1;

/// Largest accepted averaging window. Also the filter history capacity.
pub const WINDOW_MAX: u8 = 20;

/// Averaging window at power-up.
pub const WINDOW_DEFAULT: u8 = 10;

const _: () = assert!(WINDOW_MIN >= 1);
const _: () = assert!(WINDOW_MIN <= WINDOW_DEFAULT && WINDOW_DEFAULT <= WINDOW_MAX);

/// Filter history capacity.
pub const FILTER_HISTORY: usize = WINDOW_MAX as usize;

// =============================================================================
// Queues and Timing
// =============================================================================

/// Capacity of both inter-task sample queues.
pub const QUEUE_SIZE: usize = 3;

/// Sensor sampling frequency.
pub const SENSOR_FREQUENCY_HZ: u64 = 10;

/// Delay between two samples in milliseconds.
pub const SENSOR_PERIOD_MS: u64 = 1000 / SENSOR_FREQUENCY_HZ;

/// Delay between two diagnostics reports in milliseconds.
pub const REPORT_PERIOD_MS: u64 = 3000;

/// Length of one overflow counter tick in microseconds.
pub const OVERFLOW_TICK_US: u64 = 10;

// =============================================================================
// Display
// =============================================================================

/// OLED width in pixels.
pub const DISPLAY_WIDTH: u32 = 96;

/// OLED height in pixels (two 8-pixel pages).
pub const DISPLAY_HEIGHT: u32 = 16;

/// Number of graph columns (one sample each).
pub const GRAPH_COLUMNS: usize = 69;

/// First x position of the graph, right of the y axis.
pub const GRAPH_X: u32 = 26;

/// Divisor from an averaged sample to a bar height.
pub const BAR_SCALE: u8 = 10;

const _: () = assert!(GRAPH_X as usize + GRAPH_COLUMNS <= DISPLAY_WIDTH as usize);
const _: () = assert!(((SAMPLE_MAX / BAR_SCALE) as u32) < DISPLAY_HEIGHT);

// =============================================================================
// Shared Runtime Configuration
// =============================================================================

/// Configuration shared between the console and the pipeline tasks.
pub struct SharedConfig {
    window: AtomicU8,
    reporter_active: AtomicBool,
    reporter_available: AtomicBool,
}

impl SharedConfig {
    /// Create the power-up configuration.
    pub const fn new() -> Self {
        Self {
            window: AtomicU8::new(WINDOW_DEFAULT),
            reporter_active: AtomicBool::new(false),
            reporter_available: AtomicBool::new(true),
        }
    }

    /// Current averaging window, always in `[WINDOW_MIN, WINDOW_MAX]`.
    #[inline]
    pub fn window(&self) -> u8 { self.window.load(Ordering::Relaxed) }

    /// Store a new averaging window, clamped into range.
    ///
    /// Returns the value actually stored.
    pub fn set_window(
        &self,
        requested: u8,
    ) -> u8 {
        let window = clamp_window(requested);
        self.window.store(window, Ordering::Relaxed);
        window
    }

    /// Whether the diagnostics reporter is running.
    #[inline]
    pub fn reporter_active(&self) -> bool { self.reporter_active.load(Ordering::Acquire) }

    /// Flag the diagnostics reporter as running or stopped.
    #[inline]
    pub fn set_reporter_active(
        &self,
        active: bool,
    ) {
        self.reporter_active.store(active, Ordering::Release);
    }

    /// Whether the diagnostics reporter can still be started.
    #[inline]
    pub fn reporter_available(&self) -> bool { self.reporter_available.load(Ordering::Acquire) }

    /// Mark the diagnostics reporter as permanently stopped.
    pub fn retire_reporter(&self) {
        self.reporter_available.store(false, Ordering::Release);
        self.reporter_active.store(false, Ordering::Release);
    }
}

impl Default for SharedConfig {
    fn default() -> Self { Self::new() }
}

/// Clamp a requested window into `[WINDOW_MIN, WINDOW_MAX]`.
#[inline]
pub const fn clamp_window(requested: u8) -> u8 {
    if requested < WINDOW_MIN {
        WINDOW_MIN
    } else if requested > WINDOW_MAX {
        WINDOW_MAX
    } else {
        requested
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
