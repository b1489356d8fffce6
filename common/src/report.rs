//! Task and heap diagnostics report ("top").
//!
//! Once per reporting period the reporter takes a snapshot of every task,
//! derives CPU share and stack usage, and prints a fixed-width table followed
//! by a heap usage bar:
//!
//! ```text
//! +--------------+--------+---------------------------------+
//! |     TASK     |  CPU   |       STACK (BYTES) (PERC)      |
//! |     NAME     |  USE%  | TOTAL | NOW | PERC | MAX | PERC |
//! +--------------+--------+-------+-----+------+-----+------+
//! |     SensorGen|   1.3% |   256 |  64 |  25% |  96 |  37% |
//! +--------------+--------+-------+-----+------+-----+------+
//! +------------------------------------+------+------+------+
//! |             HEAP USAGE             |  TOT |  USE | FREE |
//! +------------------------------------+------+------+------+
//! |    [|||||                29 %]     | 4096 | 1228 | 2868 |
//! +------------------------------------+------+------+------+
//! ```
//!
//! # CPU Share
//!
//! Cumulative run times and the reference clock are both counted in overflow
//! ticks. The share of one task over the last period is
//! `(runtime_now - runtime_prev) * 1000 / tick_delta` per mille, where
//! `tick_delta` is the wraparound-safe distance between this cycle's counter
//! value and the previous one.
//!
//! # Working Buffers
//!
//! Snapshots live in fixed-capacity buffers sized for [`MAX_TASKS`] tasks.
//! Previous run times are matched by task name, so tasks appearing or
//! disappearing between cycles are handled (a new task starts from zero).

use heapless::{String, Vec};

use crate::error::ReportError;
use crate::format::{Arg, ByteSink, write_formatted};
use crate::ticks::ticks_between;

// =============================================================================
// Configuration
// =============================================================================

/// Most tasks a snapshot can hold.
pub const MAX_TASKS: usize = 8;

/// Longest task name.
pub const TASK_NAME_LEN: usize = 16;

/// Size of one stack word (`StackType_t` on a 32-bit core).
pub const STACK_WORD_BYTES: u32 = 4;

/// Cells in the heap usage bar.
pub const HEAP_BAR_CELLS: u32 = 20;

/// Percent represented by one heap bar cell.
pub const HEAP_BAR_STEP: u32 = 100 / HEAP_BAR_CELLS;

/// Per mille threshold below which the CPU share prints as `< 1%`.
pub const CPU_VISIBLE_PERMILLE: u32 = 10;

const _: () = assert!(HEAP_BAR_STEP * HEAP_BAR_CELLS == 100);

pub type TaskName = String<TASK_NAME_LEN>;

// =============================================================================
// Table Layout
// =============================================================================

const TASK_RULE: &str = "+--------------+--------+---------------------------------+\r\n";
const TASK_HEADER_1: &str = "|     TASK     |  CPU   |       STACK (BYTES) (PERC)      |\r\n";
const TASK_HEADER_2: &str = "|     NAME     |  USE%  | TOTAL | NOW | PERC | MAX | PERC |\r\n";
const TASK_SPLIT: &str = "+--------------+--------+-------+-----+------+-----+------+\r\n";
const HEAP_RULE: &str = "+------------------------------------+------+------+------+\r\n";
const HEAP_HEADER: &str = "|             HEAP USAGE             |  TOT |  USE | FREE |\r\n";

const ROW_NAME: &str = "| %13s|";
const ROW_CPU: &str = "%4c.%c%% |";
const ROW_CPU_BELOW_ONE: &str = "   < 1% |";
const ROW_STACK: &str = "%6h |%4h |%4h%% |%4h |%4h%% |\r\n";
const HEAP_BAR_OPEN: &str = "|    [";
const HEAP_ROW: &str = "%3c %%]     | %4d | %4d | %4d |\r\n";

// =============================================================================
// Snapshot Types
// =============================================================================

/// Run-time and stack metrics of one task at snapshot time.
///
/// Stack addresses are in stack words; the stack grows down from `stack_end`
/// towards `stack_base`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskMetrics {
    pub name: TaskName,
    /// Cumulative run time in overflow ticks (wraps).
    pub runtime: u32,
    pub stack_base: u32,
    pub stack_top: u32,
    pub stack_end: u32,
    /// Smallest number of free stack words ever observed.
    pub high_water_mark: u32,
}

impl TaskMetrics {
    /// Build metrics for a task, failing if the name does not fit.
    pub fn new(
        name: &str,
        runtime: u32,
        stack_base: u32,
        stack_top: u32,
        stack_end: u32,
        high_water_mark: u32,
    ) -> Result<Self, ReportError> {
        let name = TaskName::try_from(name).map_err(|_| ReportError::TaskNameTooLong { max: TASK_NAME_LEN })?;
        Ok(Self {
            name,
            runtime,
            stack_base,
            stack_top,
            stack_end,
            high_water_mark,
        })
    }

    /// Stack usage derived from the bounds and the high-water mark.
    pub fn stack_usage(&self) -> StackUsage {
        let total = self.stack_end.saturating_sub(self.stack_base);
        let now = self.stack_end.saturating_sub(self.stack_top).min(total);
        let max = total.saturating_sub(self.high_water_mark);
        StackUsage {
            total_bytes: total * STACK_WORD_BYTES,
            now_bytes: now * STACK_WORD_BYTES,
            now_percent: percent(now, total),
            max_bytes: max * STACK_WORD_BYTES,
            max_percent: percent(max, total),
        }
    }
}

/// Stack figures printed in one table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackUsage {
    pub total_bytes: u32,
    pub now_bytes: u32,
    pub now_percent: u32,
    pub max_bytes: u32,
    pub max_percent: u32,
}

/// Heap totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub total: u32,
    pub free: u32,
}

impl HeapStats {
    #[inline]
    pub const fn used(&self) -> u32 { self.total.saturating_sub(self.free) }

    #[inline]
    pub fn used_percent(&self) -> u32 { percent(self.used(), self.total) }
}

/// `part * 100 / whole`, 0 for an empty whole.
fn percent(
    part: u32,
    whole: u32,
) -> u32 {
    if whole == 0 {
        return 0;
    }
    (u64::from(part) * 100 / u64::from(whole)) as u32
}

/// CPU share of one task over a reporting period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuShare {
    /// At least 1 %, with one decimal.
    Percent { whole: u32, tenth: u32 },
    /// Less than 1 % (or no time elapsed).
    BelowOne,
}

/// CPU share in per mille, `None` when no ticks elapsed.
pub fn cpu_permille(
    runtime_delta: u32,
    tick_delta: u32,
) -> Option<u32> {
    if tick_delta == 0 {
        return None;
    }
    let permille = u64::from(runtime_delta) * 1000 / u64::from(tick_delta);
    Some(permille.min(u64::from(u32::MAX)) as u32)
}

/// Classify a per mille value for display.
pub fn cpu_share(permille: Option<u32>) -> CpuShare {
    match permille {
        Some(p) if p >= CPU_VISIBLE_PERMILLE => CpuShare::Percent {
            whole: p / 10,
            tenth: p % 10,
        },
        _ => CpuShare::BelowOne,
    }
}

/// Split the heap bar into filled and empty cells (always [`HEAP_BAR_CELLS`] total).
pub fn heap_bar(used_percent: u32) -> (u32, u32) {
    let filled = used_percent.min(100) / HEAP_BAR_STEP;
    (filled, HEAP_BAR_CELLS - filled)
}

/// Source of task and heap metrics.
pub trait SystemProbe {
    /// Append every task's metrics to `tasks`.
    ///
    /// Returns [`ReportError::TooManyTasks`] if `tasks` fills up.
    fn snapshot(
        &self,
        tasks: &mut Vec<TaskMetrics, MAX_TASKS>,
    ) -> Result<(), ReportError>;

    /// Current heap totals.
    fn heap(&self) -> HeapStats;
}

// =============================================================================
// Rendering
// =============================================================================

fn write_task_row<S: ByteSink + ?Sized>(
    serial: &mut S,
    task: &TaskMetrics,
    share: CpuShare,
) {
    write_formatted(serial, ROW_NAME, &[Arg::Str(task.name.as_str())]);

    match share {
        CpuShare::Percent { whole, tenth } => {
            let whole = u8::try_from(whole).unwrap_or(u8::MAX);
            write_formatted(serial, ROW_CPU, &[Arg::Narrow(whole), Arg::Narrow(tenth as u8)]);
        }
        CpuShare::BelowOne => serial.put_str(ROW_CPU_BELOW_ONE),
    }

    let usage = task.stack_usage();
    let medium = |v: u32| Arg::Medium(u16::try_from(v).unwrap_or(u16::MAX));
    write_formatted(
        serial,
        ROW_STACK,
        &[
            medium(usage.total_bytes),
            medium(usage.now_bytes),
            medium(usage.now_percent),
            medium(usage.max_bytes),
            medium(usage.max_percent),
        ],
    );
}

fn write_heap_section<S: ByteSink + ?Sized>(
    serial: &mut S,
    heap: HeapStats,
) {
    serial.put_str(HEAP_RULE);
    serial.put_str(HEAP_HEADER);
    serial.put_str(HEAP_RULE);

    let used_percent = heap.used_percent();
    let (filled, empty) = heap_bar(used_percent);
    serial.put_str(HEAP_BAR_OPEN);
    for _ in 0..filled {
        serial.put(b'|');
    }
    for _ in 0..empty {
        serial.put(b' ');
    }
    write_formatted(
        serial,
        HEAP_ROW,
        &[
            Arg::Narrow(used_percent.min(100) as u8),
            Arg::Wide(heap.total),
            Arg::Wide(heap.used()),
            Arg::Wide(heap.free),
        ],
    );
    serial.put_str(HEAP_RULE);
}

// =============================================================================
// Reporter
// =============================================================================

/// Per-cycle state of the diagnostics task.
///
/// Everything here is task-local and survives while the task is suspended.
pub struct DiagnosticsReporter {
    tasks: Vec<TaskMetrics, MAX_TASKS>,
    previous: Vec<(TaskName, u32), MAX_TASKS>,
    last_mark: u32,
}

impl DiagnosticsReporter {
    /// Create a reporter whose first period starts at counter value `mark`.
    pub const fn new(mark: u32) -> Self {
        Self {
            tasks: Vec::new(),
            previous: Vec::new(),
            last_mark: mark,
        }
    }

    /// Counter value the next period is measured from.
    #[cfg(test)]
    pub const fn last_mark(&self) -> u32 { self.last_mark }

    fn previous_runtime(
        &self,
        name: &str,
    ) -> u32 {
        self.previous
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map_or(0, |(_, runtime)| *runtime)
    }

    /// Run one reporting cycle ending at counter value `now`.
    ///
    /// On error nothing is printed and the baseline is left untouched.
    pub fn cycle<P, S>(
        &mut self,
        probe: &P,
        now: u32,
        serial: &mut S,
    ) -> Result<(), ReportError>
    where
        P: SystemProbe + ?Sized,
        S: ByteSink + ?Sized,
    {
        self.tasks.clear();
        probe.snapshot(&mut self.tasks)?;

        let tick_delta = ticks_between(self.last_mark, now);

        serial.put_str(TASK_RULE);
        serial.put_str(TASK_HEADER_1);
        serial.put_str(TASK_HEADER_2);
        serial.put_str(TASK_SPLIT);

        for task in &self.tasks {
            let runtime_delta = task.runtime.wrapping_sub(self.previous_runtime(&task.name));
            let share = cpu_share(cpu_permille(runtime_delta, tick_delta));
            write_task_row(serial, task, share);
        }
        serial.put_str(TASK_SPLIT);

        write_heap_section(serial, probe.heap());

        self.previous.clear();
        for task in &self.tasks {
            // Same capacity as `tasks`, cannot overflow.
            self.previous.push((task.name.clone(), task.runtime)).ok();
        }
        self.last_mark = now;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
