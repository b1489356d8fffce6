//! Embassy tasks running the telemetry pipeline.
//!
//! ```text
//! sensor_task ──SAMPLES(3)──▶ average_task ──AVERAGES(3)──▶ display_task ──FRAMES──▶ presenter
//! ```
//!
//! Queues block on both ends, so a slow consumer throttles its producer rather
//! than losing samples. Each stage body is a generic `*_cycle` function so it
//! can be driven from tests with a local channel.

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
use embassy_sync::watch::{self, Watch};
use embassy_time::{Duration, Instant, Ticker, Timer};
use log::{error, info, warn};
use telemetry_common::config::{OVERFLOW_TICK_US, QUEUE_SIZE, REPORT_PERIOD_MS, SENSOR_PERIOD_MS, SharedConfig};
use telemetry_common::console::ReporterControl;
use telemetry_common::display::GraphicsSink;
use telemetry_common::filter::MovingAverageFilter;
use telemetry_common::report::DiagnosticsReporter;
use telemetry_common::source::TelemetrySource;
use telemetry_common::ticks::TickCounter;
use telemetry_common::waveform::WaveformRenderer;

use crate::frame::{OledFrame, TerminalScreen};
use crate::registry::{TaskId, TaskRegistry};
use crate::serial::StdoutSerial;

// =============================================================================
// Shared Queues
// =============================================================================

/// Sample queue between two pipeline stages.
pub type SampleChannel = Channel<CriticalSectionRawMutex, u8, QUEUE_SIZE>;

/// Raw samples from the sensor task to the filter task.
pub static SAMPLES: SampleChannel = Channel::new();

/// Filtered samples from the filter task to the display task.
pub static AVERAGES: SampleChannel = Channel::new();

/// Frame receivers: terminal presenter and SDL window.
pub const FRAME_RECEIVERS: usize = 2;

/// Latest rendered OLED frame.
pub static FRAMES: Watch<CriticalSectionRawMutex, OledFrame, FRAME_RECEIVERS> = Watch::new();

/// Overflow timer period.
pub const TIMER_PERIOD_US: u64 = 1000;

// Estimated stack depth (words) of each task body.
const SENSOR_DEPTH: u32 = 24;
const AVERAGE_DEPTH: u32 = 20;
const DISPLAY_DEPTH: u32 = 44;
const TOP_DEPTH: u32 = 96;

// =============================================================================
// Reporter Gate
// =============================================================================

/// Suspend/resume handle for the top task.
pub struct ReporterGate {
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl ReporterGate {
    pub const fn new() -> Self { Self { wake: Signal::new() } }

    /// Park until the reporter is enabled in `config`.
    pub async fn wait_active(
        &self,
        config: &SharedConfig,
    ) {
        while !config.reporter_active() {
            self.wake.wait().await;
        }
    }
}

impl Default for ReporterGate {
    fn default() -> Self { Self::new() }
}

impl ReporterControl for ReporterGate {
    fn resume(&self) { self.wake.signal(()); }

    fn suspend(&self) { self.wake.reset(); }
}

// =============================================================================
// Stage Bodies
// =============================================================================

fn busy_since(started: Instant) -> u64 { started.elapsed().as_micros() }

/// Generate one sample and queue it.
pub async fn sensor_cycle<M: RawMutex, const N: usize>(
    source: &mut TelemetrySource,
    registry: &TaskRegistry,
    tx: &Sender<'_, M, u8, N>,
) -> u8 {
    let started = Instant::now();
    let sample = source.next_sample();
    registry.record(TaskId::Sensor, busy_since(started), SENSOR_DEPTH);
    tx.send(sample).await;
    sample
}

/// Filter one sample with the current window and pass the average on.
pub async fn average_cycle<M: RawMutex, const N: usize>(
    filter: &mut MovingAverageFilter,
    config: &SharedConfig,
    registry: &TaskRegistry,
    rx: &Receiver<'_, M, u8, N>,
    tx: &Sender<'_, M, u8, N>,
) -> u8 {
    let sample = rx.receive().await;
    let started = Instant::now();
    let window = config.window();
    let average = filter.process(sample, window);
    registry.record(TaskId::Average, busy_since(started), AVERAGE_DEPTH + u32::from(window));
    tx.send(average).await;
    average
}

/// Receive one average and redraw the waveform into `frame`.
pub async fn display_cycle<M: RawMutex, const N: usize>(
    renderer: &mut WaveformRenderer,
    config: &SharedConfig,
    registry: &TaskRegistry,
    rx: &Receiver<'_, M, u8, N>,
    frame: &mut OledFrame,
) -> u8 {
    let average = rx.receive().await;
    let started = Instant::now();
    renderer.update(average, config.window(), &mut GraphicsSink::new(frame));
    registry.record(TaskId::Display, busy_since(started), DISPLAY_DEPTH);
    average
}

// =============================================================================
// Tasks
// =============================================================================

/// Periodic sensor task (10 Hz).
#[embassy_executor::task]
pub async fn sensor_task(
    seed: u32,
    registry: &'static TaskRegistry,
) {
    let tx = SAMPLES.sender();
    let mut source = TelemetrySource::new(seed);
    info!("Sensor task started (seed {seed:#010x}, level {})", source.current());
    let mut ticker = Ticker::every(Duration::from_millis(SENSOR_PERIOD_MS));
    loop {
        sensor_cycle(&mut source, registry, &tx).await;
        ticker.next().await;
    }
}

/// Moving-average filter task.
#[embassy_executor::task]
pub async fn average_task(
    config: &'static SharedConfig,
    registry: &'static TaskRegistry,
) {
    info!("Average task started");

    let rx = SAMPLES.receiver();
    let tx = AVERAGES.sender();
    let mut filter = MovingAverageFilter::new();
    loop {
        average_cycle(&mut filter, config, registry, &rx, &tx).await;
    }
}

/// Waveform task; publishes every redrawn frame.
#[embassy_executor::task]
pub async fn display_task(
    config: &'static SharedConfig,
    registry: &'static TaskRegistry,
) {
    info!("Display task started");

    let rx = AVERAGES.receiver();
    let frames = FRAMES.sender();
    let mut renderer = WaveformRenderer::new();
    let mut frame = OledFrame::new();
    loop {
        display_cycle(&mut renderer, config, registry, &rx, &mut frame).await;
        frames.send(frame.clone());
    }
}

/// Diagnostics report task; parked until the console enables it.
#[embassy_executor::task]
pub async fn top_task(
    config: &'static SharedConfig,
    gate: &'static ReporterGate,
    registry: &'static TaskRegistry,
    clock: &'static TickCounter,
) {
    info!("Top task started");

    let mut reporter = DiagnosticsReporter::new(clock.now());
    loop {
        gate.wait_active(config).await;

        let started = Instant::now();
        let result = reporter.cycle(registry, clock.now(), &mut StdoutSerial::lock());
        registry.record(TaskId::Top, busy_since(started), TOP_DEPTH);
        if let Err(err) = result {
            config.retire_reporter();
            error!("Top task stopped: {err}; `top` is unavailable");
            return;
        }

        Timer::after_millis(REPORT_PERIOD_MS).await;
    }
}

/// Run-time statistics timer: advances the overflow counter by elapsed 10 us ticks.
#[embassy_executor::task]
pub async fn overflow_timer_task(clock: &'static TickCounter) {
    let start = Instant::now();
    let mut last = 0u64;
    let mut ticker = Ticker::every(Duration::from_micros(TIMER_PERIOD_US));
    loop {
        ticker.next().await;
        let elapsed = start.elapsed().as_micros() / OVERFLOW_TICK_US;
        clock.advance(elapsed.wrapping_sub(last) as u32);
        last = elapsed;
    }
}

/// Draws every published frame on the terminal.
#[embassy_executor::task]
pub async fn terminal_task(mut frames: watch::Receiver<'static, CriticalSectionRawMutex, OledFrame, FRAME_RECEIVERS>) {
    let mut screen = TerminalScreen::new();
    loop {
        let frame = frames.changed().await;
        if let Err(err) = screen.present(&frame) {
            warn!("Terminal display stopped: {err}");
            return;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
