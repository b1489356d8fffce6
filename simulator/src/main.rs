//! Telemetry pipeline simulator for the desktop.
//!
//! Runs the pipeline tasks on the embassy `std` executor. Stdin/stdout act as
//! the serial console, the OLED is drawn on the terminal (stderr) or, with the
//! `window` feature, in an SDL window.
//!
//! On a terminal the console reads keys in raw mode and the OLED keeps the top
//! rows of the screen while serial output scrolls below it. Ctrl+C or Ctrl+D
//! quits.
//!
//! # Console Commands
//!
//! - **N<n>**: Set the filter window (clamped to 1..=20), e.g. `N5`
//! - **top**: Start the periodic task/heap report
//! - **q**: Stop the report (only while it is running)
//!
//! Logging goes to stderr and is filtered with `RUST_LOG` (default `info`).

// Crate-level lints
#![allow(clippy::cast_possible_truncation)]

mod frame;
mod registry;
mod serial;
mod tasks;
mod terminal;
#[cfg(feature = "window")]
mod window;

use std::io::{self, IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use embassy_executor::{Executor, SpawnError, Spawner};
use log::{error, info, warn};
use static_cell::StaticCell;
use telemetry_common::config::{QUEUE_SIZE, SharedConfig, WINDOW_DEFAULT};
use telemetry_common::console::CommandConsole;
use telemetry_common::ticks::TickCounter;

use crate::frame::FRAME_ROWS;
use crate::registry::{DEFAULT_HEAP_BYTES, TaskId, TaskRegistry};
use crate::tasks::{
    FRAMES,
    ReporterGate,
    average_task,
    display_task,
    overflow_timer_task,
    sensor_task,
    terminal_task,
    top_task,
};

/// Heap taken by one queue control block.
const QUEUE_CONTROL_BYTES: u32 = 80;

/// Pipeline queues allocated from the heap.
const QUEUE_COUNT: u32 = 2;

/// Idle task stack depth in words.
const IDLE_DEPTH: u32 = 12;

// =============================================================================
// Shared State
// =============================================================================

static CONFIG: SharedConfig = SharedConfig::new();
static CLOCK: TickCounter = TickCounter::new();
static GATE: ReporterGate = ReporterGate::new();
static REGISTRY: StaticCell<TaskRegistry> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

// =============================================================================
// Command Line
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DisplayMode {
    /// No OLED output
    Off,
    /// Half-block rendering on stderr
    Terminal,
    /// SDL window (built with `--features window`)
    Window,
}

#[derive(Parser, Debug)]
#[command(name = "simulator", version, about = "Telemetry pipeline simulator")]
struct Args {
    /// Sensor generator seed (defaults to the clock; 0 is replaced by 1)
    #[arg(long)]
    seed: Option<u32>,

    /// Initial filter window, clamped to 1..=20
    #[arg(long, default_value_t = WINDOW_DEFAULT)]
    window: u8,

    /// Where to show the OLED
    #[arg(long, value_enum, default_value_t = DisplayMode::Terminal)]
    display: DisplayMode,

    /// Simulated heap size in bytes
    #[arg(long, default_value_t = DEFAULT_HEAP_BYTES)]
    heap_size: u32,
}

/// Everything the executor thread needs to start the tasks.
struct Launch {
    seed: u32,
    display: DisplayMode,
    registry: &'static TaskRegistry,
}

/// Log to stderr; raw terminals need explicit carriage returns.
fn init_logging(raw: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if raw {
        builder.format(|buf, record| {
            writeln!(buf, "[{} {:<5} {}] {}\r", buf.timestamp(), record.level(), record.target(), record.args())
        });
    }
    builder.init();
}

fn clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(1)
}

// =============================================================================
// Startup
// =============================================================================

fn check_spawn(
    name: &str,
    result: Result<(), SpawnError>,
) {
    if let Err(err) = result {
        error!("Failed to spawn {name} task: {err:?}");
    }
}

fn spawn_tasks(
    spawner: Spawner,
    launch: Launch,
) {
    let Launch { seed, display, registry } = launch;

    check_spawn("overflow timer", spawner.spawn(overflow_timer_task(&CLOCK)));
    check_spawn("sensor", spawner.spawn(sensor_task(seed, registry)));
    check_spawn("average", spawner.spawn(average_task(&CONFIG, registry)));
    check_spawn("display", spawner.spawn(display_task(&CONFIG, registry)));
    check_spawn("top", spawner.spawn(top_task(&CONFIG, &GATE, registry, &CLOCK)));

    if display == DisplayMode::Terminal {
        match FRAMES.receiver() {
            Some(frames) => check_spawn("terminal", spawner.spawn(terminal_task(frames))),
            None => warn!("No frame receiver left for the terminal display"),
        }
    }
}

fn run_executor(launch: Launch) {
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| spawn_tasks(spawner, launch))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(io::stdin().is_terminal());
    terminal::install_panic_hook();

    #[cfg(not(feature = "window"))]
    if args.display == DisplayMode::Window {
        bail!("window display needs the `window` feature");
    }

    let window = CONFIG.set_window(args.window);
    let seed = args.seed.unwrap_or_else(clock_seed);
    info!("Starting telemetry simulator (window {window}, seed {seed:#010x})");

    let registry: &'static TaskRegistry = REGISTRY.init(TaskRegistry::new(&CLOCK, args.heap_size));
    if !registry.allocate_stacks() {
        bail!("heap of {} bytes cannot hold the task stacks", args.heap_size);
    }
    if !registry.heap().allocate(QUEUE_COUNT * (QUEUE_CONTROL_BYTES + QUEUE_SIZE as u32)) {
        bail!("heap of {} bytes cannot hold the sample queues", args.heap_size);
    }
    registry.record(TaskId::Idle, 0, IDLE_DEPTH);

    let mut display = args.display;
    if display == DisplayMode::Terminal && !terminal::reserve_display_rows(FRAME_ROWS)? {
        warn!("stderr is not a terminal with room for the OLED; display off");
        display = DisplayMode::Off;
    }

    let raw = match terminal::enable_console_input() {
        Ok(raw) => raw,
        Err(err) => {
            terminal::restore_terminal().ok();
            return Err(err);
        }
    };
    let _receiver = serial::spawn_receiver(CommandConsole::new(), &CONFIG, &GATE, raw)
        .map_err(|err| {
            terminal::restore_terminal().ok();
            err
        })
        .context("failed to start serial receiver")?;
    info!("Console ready: N<n> sets the window, top starts the report, q stops it");

    let launch = Launch { seed, display, registry };

    #[cfg(feature = "window")]
    if args.display == DisplayMode::Window {
        let frames = FRAMES.receiver().context("no frame receiver left for the window")?;
        std::thread::Builder::new()
            .name("executor".into())
            .spawn(move || run_executor(launch))
            .context("failed to start executor thread")?;
        window::run(frames);
        info!("Window closed");
        return terminal::restore_terminal();
    }

    run_executor(launch);
    Ok(())
}
