//! Simulated task accounting and heap for the diagnostics report.
//!
//! The host executor has no per-task run-time counters or stacks, so each
//! pipeline task reports its own busy time and an estimated stack depth after
//! every cycle. Busy time is converted into overflow ticks so it shares a
//! clock with [`TickCounter`]; the `IDLE` row takes whatever is left.
//!
//! Stack regions are laid out back to back from [`STACK_REGION_BASE`] (in
//! stack words) in registration order.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use heapless::Vec;
use telemetry_common::config::OVERFLOW_TICK_US;
use telemetry_common::error::ReportError;
use telemetry_common::report::{HeapStats, MAX_TASKS, STACK_WORD_BYTES, SystemProbe, TaskMetrics};
use telemetry_common::ticks::TickCounter;

/// First stack word address handed out to a task.
pub const STACK_REGION_BASE: u32 = 0x0800;

/// Default heap size in bytes.
pub const DEFAULT_HEAP_BYTES: u32 = 4096;

/// Tasks that own a stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskId {
    Sensor,
    Average,
    Display,
    Top,
    Idle,
}

impl TaskId {
    pub const ALL: [Self; 5] = [Self::Sensor, Self::Average, Self::Display, Self::Top, Self::Idle];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Sensor => "SensorGen",
            Self::Average => "AverageCalc",
            Self::Display => "DisplayGraph",
            Self::Top => "TopTask",
            Self::Idle => "IDLE",
        }
    }

    /// Stack size in words.
    pub const fn stack_words(self) -> u32 {
        match self {
            Self::Sensor | Self::Average | Self::Display => 64,
            Self::Top => 128,
            Self::Idle => 32,
        }
    }

    const fn index(self) -> usize { self as usize }
}

const TASK_COUNT: usize = TaskId::ALL.len();

const _: () = assert!(TASK_COUNT <= MAX_TASKS);

/// Per-task counters.
struct TaskSlot {
    busy_us: AtomicU64,
    depth: AtomicU32,
    peak: AtomicU32,
}

impl TaskSlot {
    const fn new() -> Self {
        Self {
            busy_us: AtomicU64::new(0),
            depth: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        }
    }
}

/// Fixed-size heap with bump allocation (no frees, like heap_1).
pub struct HeapAccounting {
    total: u32,
    used: AtomicU32,
}

impl HeapAccounting {
    pub const fn new(total: u32) -> Self {
        Self {
            total,
            used: AtomicU32::new(0),
        }
    }

    /// Reserve `bytes`, failing if the heap would overflow.
    pub fn allocate(
        &self,
        bytes: u32,
    ) -> bool {
        self.used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                used.checked_add(bytes).filter(|next| *next <= self.total)
            })
            .is_ok()
    }

    pub fn stats(&self) -> HeapStats {
        let used = self.used.load(Ordering::Relaxed);
        HeapStats {
            total: self.total,
            free: self.total.saturating_sub(used),
        }
    }
}

/// Run-time and stack bookkeeping for every simulated task.
pub struct TaskRegistry {
    slots: [TaskSlot; TASK_COUNT],
    clock: &'static TickCounter,
    heap: HeapAccounting,
}

impl TaskRegistry {
    pub const fn new(
        clock: &'static TickCounter,
        heap_bytes: u32,
    ) -> Self {
        Self {
            slots: [const { TaskSlot::new() }; TASK_COUNT],
            clock,
            heap: HeapAccounting::new(heap_bytes),
        }
    }

    pub const fn heap(&self) -> &HeapAccounting { &self.heap }

    /// Allocate every task stack from the heap.
    pub fn allocate_stacks(&self) -> bool {
        TaskId::ALL
            .iter()
            .all(|task| self.heap.allocate(task.stack_words() * STACK_WORD_BYTES))
    }

    /// Charge `busy_us` of run time to `task`, which used `depth` stack words.
    pub fn record(
        &self,
        task: TaskId,
        busy_us: u64,
        depth: u32,
    ) {
        let slot = &self.slots[task.index()];
        let depth = depth.min(task.stack_words());
        slot.busy_us.fetch_add(busy_us, Ordering::Relaxed);
        slot.depth.store(depth, Ordering::Relaxed);
        slot.peak.fetch_max(depth, Ordering::Relaxed);
    }

    /// Cumulative run time in overflow ticks (wraps like the hardware counter).
    pub fn runtime(
        &self,
        task: TaskId,
    ) -> u32 {
        if task == TaskId::Idle {
            let busy = TaskId::ALL
                .iter()
                .filter(|t| **t != TaskId::Idle)
                .fold(0u32, |acc, t| acc.wrapping_add(self.runtime(*t)));
            return self.clock.now().wrapping_sub(busy);
        }
        let busy_us = self.slots[task.index()].busy_us.load(Ordering::Relaxed);
        (busy_us / OVERFLOW_TICK_US) as u32
    }

    fn metrics(
        &self,
        task: TaskId,
        stack_base: u32,
    ) -> Result<TaskMetrics, ReportError> {
        let slot = &self.slots[task.index()];
        let words = task.stack_words();
        let stack_end = stack_base + words;
        let depth = slot.depth.load(Ordering::Relaxed);
        let peak = slot.peak.load(Ordering::Relaxed);
        TaskMetrics::new(
            task.name(),
            self.runtime(task),
            stack_base,
            stack_end - depth,
            stack_end,
            words - peak,
        )
    }
}

impl SystemProbe for TaskRegistry {
    fn snapshot(
        &self,
        tasks: &mut Vec<TaskMetrics, MAX_TASKS>,
    ) -> Result<(), ReportError> {
        let mut base = STACK_REGION_BASE;
        for task in TaskId::ALL {
            tasks
                .push(self.metrics(task, base)?)
                .map_err(|_| ReportError::TooManyTasks { max: MAX_TASKS })?;
            base += task.stack_words();
        }
        Ok(())
    }

    fn heap(&self) -> HeapStats { self.heap.stats() }
}

// =============================================================================
// Unit Tests
// =============================================================================
