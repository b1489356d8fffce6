//! Serial command console.
//!
//! The console is driven one received byte at a time. The protocol logic is
//! the pure transition [`step`]; [`CommandConsole`] is the thin byte-arrival
//! handler that applies its [`Reaction`]s to the shared configuration, the
//! reporter and the serial port.
//!
//! # Commands
//!
//! | Input                 | Effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | `top`                 | Start the diagnostics report, gate the console |
//! | `q` (gated mode only) | Stop the diagnostics report                     |
//! | `N<d>` / `N<d><d>`    | Set the averaging window, clamped to `[1, 20]`  |
//!
//! Lines end with `\r` or `\n`. At most three command bytes are buffered.

use log::debug;

use crate::config::{SharedConfig, clamp_window};
use crate::format::ByteSink;

/// Capacity of the command buffer.
pub const COMMAND_CAPACITY: usize = 3;

pub const MSG_INVALID_SHORT: &str = "\r\nInvalid command\r\n";
pub const MSG_INVALID: &str = "\r\nInvalid command";
pub const MSG_NOT_A_NUMBER: &str = "\r\nInvalid command, N must be a number";
pub const MSG_REPORT_STOPPED: &str = "Top Task was stopped\r\n";
pub const MSG_REPORT_UNAVAILABLE: &str = "\r\nTop Task is unavailable";
pub const LINE_BREAK: &str = "\r\n";

/// Console input mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Buffering a command line.
    #[default]
    Collecting,
    /// Diagnostics report running; only `q` is accepted.
    ReporterGate,
}

/// Up to [`COMMAND_CAPACITY`] buffered command bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    bytes: [u8; COMMAND_CAPACITY],
    len: usize,
}

impl CommandBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; COMMAND_CAPACITY],
            len: 0,
        }
    }

    /// Append a byte. Returns `false` (and drops it) when full.
    pub fn push(
        &mut self,
        byte: u8,
    ) -> bool {
        if self.len >= COMMAND_CAPACITY {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    #[inline]
    pub fn clear(&mut self) { *self = Self::new(); }

    #[inline]
    pub fn as_slice(&self) -> &[u8] { &self.bytes[..self.len] }

    #[inline]
    pub const fn len(&self) -> usize { self.len }

    #[inline]
    pub const fn is_empty(&self) -> bool { self.len == 0 }
}

/// Complete console state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsoleState {
    pub mode: Mode,
    pub buffer: CommandBuffer,
}

/// Side effect requested by a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Store a new (already clamped) averaging window.
    SetWindow(u8),
    /// Resume the diagnostics reporter.
    StartReporter,
    /// Suspend the diagnostics reporter.
    StopReporter,
}

/// Everything one input byte causes, in output order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Byte echoed back to the terminal.
    pub echo: Option<u8>,
    /// Command to execute.
    pub action: Option<Action>,
    /// Diagnostic message to print.
    pub message: Option<&'static str>,
    /// Whether a line break closes the dispatch.
    pub line_break: bool,
    /// Whether the rest of the current input batch is discarded.
    pub halt_batch: bool,
}

#[inline]
const fn is_terminator(byte: u8) -> bool { byte == b'\r' || byte == b'\n' }

/// Advance the console by one input byte.
pub fn step(
    state: ConsoleState,
    byte: u8,
) -> (ConsoleState, Reaction) {
    let mut next = state;
    let mut reaction = Reaction::default();

    if state.mode == Mode::ReporterGate {
        if byte == b'q' {
            next.mode = Mode::Collecting;
            reaction.action = Some(Action::StopReporter);
            reaction.message = Some(MSG_REPORT_STOPPED);
        }
        return (next, reaction);
    }

    if !is_terminator(byte) {
        if next.buffer.push(byte) {
            reaction.echo = Some(byte);
        } else {
            reaction.halt_batch = true;
        }
        return (next, reaction);
    }

    match state.buffer.as_slice() {
        [] => return (next, reaction),
        [_] => {
            reaction.message = Some(MSG_INVALID_SHORT);
            next.buffer.clear();
            return (next, reaction);
        }
        [b't', rest @ ..] => {
            if rest == b"op" {
                next.mode = Mode::ReporterGate;
                reaction.action = Some(Action::StartReporter);
            } else {
                reaction.message = Some(MSG_INVALID);
            }
        }
        [b'N', digits @ ..] => match parse_window(digits) {
            Some(window) => reaction.action = Some(Action::SetWindow(window)),
            None => reaction.message = Some(MSG_NOT_A_NUMBER),
        },
        _ => reaction.message = Some(MSG_INVALID),
    }

    next.buffer.clear();
    reaction.line_break = true;
    (next, reaction)
}

/// Parse one or two decimal digits and clamp into the window range.
fn parse_window(digits: &[u8]) -> Option<u8> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = digits.iter().fold(0u8, |acc, d| acc * 10 + (d - b'0'));
    Some(clamp_window(value))
}

/// Reporter suspend/resume service.
pub trait ReporterControl {
    /// Wake the reporter task.
    fn resume(&self);

    /// Park the reporter task.
    fn suspend(&self);
}

/// Byte-arrival handler around [`step`].
#[derive(Debug, Default)]
pub struct CommandConsole {
    state: ConsoleState,
}

impl CommandConsole {
    pub const fn new() -> Self {
        Self {
            state: ConsoleState {
                mode: Mode::Collecting,
                buffer: CommandBuffer::new(),
            },
        }
    }

    #[inline]
    pub const fn state(&self) -> &ConsoleState { &self.state }

    /// Process one notification's worth of received bytes.
    ///
    /// If the reporter stopped on its own while the console was gated, the
    /// console returns to collecting commands.
    pub fn on_bytes<S, R>(
        &mut self,
        bytes: &[u8],
        config: &SharedConfig,
        reporter: &R,
        serial: &mut S,
    ) where
        S: ByteSink + ?Sized,
        R: ReporterControl + ?Sized,
    {
        for (i, &byte) in bytes.iter().enumerate() {
            if self.state.mode == Mode::ReporterGate && !config.reporter_active() {
                self.state.mode = Mode::Collecting;
            }

            let (next, reaction) = step(self.state, byte);
            self.state = next;

            if let Some(echo) = reaction.echo {
                serial.put(echo);
            }
            match reaction.action {
                Some(Action::SetWindow(window)) => {
                    config.set_window(window);
                    debug!("console: window set to {}", window);
                }
                Some(Action::StartReporter) if !config.reporter_available() => {
                    self.state.mode = Mode::Collecting;
                    serial.put_str(MSG_REPORT_UNAVAILABLE);
                }
                Some(Action::StartReporter) => {
                    config.set_reporter_active(true);
                    reporter.resume();
                }
                Some(Action::StopReporter) => {
                    config.set_reporter_active(false);
                    reporter.suspend();
                }
                None => {}
            }
            if let Some(message) = reaction.message {
                serial.put_str(message);
            }
            if reaction.line_break {
                serial.put_str(LINE_BREAK);
            }
            if reaction.halt_batch {
                debug!("console: buffer full, {} byte(s) of this batch dropped", bytes.len() - i);
                break;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use heapless::Vec;

    use super::*;

    #[derive(Default)]
    struct FakeReporter {
        resumes: Cell<u32>,
        suspends: Cell<u32>,
    }

    impl ReporterControl for FakeReporter {
        fn resume(&self) { self.resumes.set(self.resumes.get() + 1); }

        fn suspend(&self) { self.suspends.set(self.suspends.get() + 1); }
    }

    struct Rig {
        console: CommandConsole,
        config: SharedConfig,
        reporter: FakeReporter,
        serial: Vec<u8, 256>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                console: CommandConsole::new(),
                config: SharedConfig::new(),
                reporter: FakeReporter::default(),
                serial: Vec::new(),
            }
        }

        fn feed(
            &mut self,
            bytes: &[u8],
        ) {
            self.console.on_bytes(bytes, &self.config, &self.reporter, &mut self.serial);
        }
    }

    fn run(bytes: &[u8]) -> (ConsoleState, Vec<Reaction, 16>) {
        let mut state = ConsoleState::default();
        let mut reactions = Vec::new();
        for &b in bytes {
            let (next, reaction) = step(state, b);
            state = next;
            reactions.push(reaction).unwrap();
        }
        (state, reactions)
    }

    #[test]
    fn test_set_window() {
        let mut rig = Rig::new();
        rig.feed(b"N5\n");
        assert_eq!(rig.config.window(), 5);
        assert_eq!(rig.serial.as_slice(), b"N5\r\n");
    }

    #[test]
    fn test_window_clamps_high_and_low() {
        let mut rig = Rig::new();
        rig.feed(b"N25\n");
        assert_eq!(rig.config.window(), 20);
        rig.feed(b"N0\n");
        assert_eq!(rig.config.window(), 1);
        rig.feed(b"N00\r");
        assert_eq!(rig.config.window(), 1);
    }

    #[test]
    fn test_non_digit_rejected() {
        let mut rig = Rig::new();
        rig.feed(b"Nx\n");
        assert_eq!(rig.config.window(), 10);
        assert_eq!(rig.serial.as_slice(), b"Nx\r\nInvalid command, N must be a number\r\n");

        rig.serial.clear();
        rig.feed(b"N1x\n");
        assert_eq!(rig.config.window(), 10);
        assert_eq!(rig.serial.as_slice(), b"N1x\r\nInvalid command, N must be a number\r\n");
    }

    #[test]
    fn test_top_then_q() {
        let mut rig = Rig::new();
        rig.feed(b"top\n");
        assert!(rig.config.reporter_active());
        assert_eq!(rig.reporter.resumes.get(), 1);
        assert_eq!(rig.console.state().mode, Mode::ReporterGate);

        // Anything but 'q' is ignored while gated, including commands.
        rig.serial.clear();
        rig.feed(b"N5\n");
        assert_eq!(rig.config.window(), 10);
        assert!(rig.serial.is_empty());

        rig.feed(b"q");
        assert!(!rig.config.reporter_active());
        assert_eq!(rig.reporter.suspends.get(), 1);
        assert_eq!(rig.console.state().mode, Mode::Collecting);
        assert_eq!(rig.serial.as_slice(), MSG_REPORT_STOPPED.as_bytes());

        rig.feed(b"N7\r");
        assert_eq!(rig.config.window(), 7);
    }

    #[test]
    fn test_gate_released_when_reporter_stops_itself() {
        let mut rig = Rig::new();
        rig.feed(b"top\n");
        assert_eq!(rig.console.state().mode, Mode::ReporterGate);

        rig.config.retire_reporter();
        rig.serial.clear();
        rig.feed(b"N5\n");
        assert_eq!(rig.config.window(), 5);
        assert_eq!(rig.console.state().mode, Mode::Collecting);
        assert_eq!(rig.serial.as_slice(), b"N5\r\n");
    }

    #[test]
    fn test_top_refused_after_reporter_retired() {
        let mut rig = Rig::new();
        rig.config.retire_reporter();
        rig.feed(b"top\n");
        assert_eq!(rig.console.state().mode, Mode::Collecting);
        assert!(!rig.config.reporter_active());
        assert_eq!(rig.reporter.resumes.get(), 0);
        assert_eq!(rig.serial.as_slice(), b"top\r\nTop Task is unavailable\r\n");

        // Not gated: 'q' is just a one-byte command.
        rig.serial.clear();
        rig.feed(b"q");
        assert_eq!(rig.reporter.suspends.get(), 0);
        assert_eq!(rig.serial.as_slice(), b"q");
    }

    #[test]
    fn test_crlf_after_top_is_swallowed_by_gate() {
        let (state, reactions) = run(b"top\r\n");
        assert_eq!(state.mode, Mode::ReporterGate);
        assert_eq!(reactions[3].action, Some(Action::StartReporter));
        assert_eq!(reactions[4], Reaction::default());
    }

    #[test]
    fn test_invalid_commands() {
        let (_, reactions) = run(b"to\n");
        assert_eq!(reactions[2].message, Some(MSG_INVALID));
        assert!(reactions[2].line_break);

        let (_, reactions) = run(b"xyz\n");
        assert_eq!(reactions[3].message, Some(MSG_INVALID));

        let (state, reactions) = run(b"t\n");
        assert_eq!(reactions[1].message, Some(MSG_INVALID_SHORT));
        assert!(!reactions[1].line_break);
        assert!(state.buffer.is_empty());
    }

    #[test]
    fn test_empty_line_is_noop() {
        let (state, reactions) = run(b"\r\n");
        assert_eq!(state, ConsoleState::default());
        assert!(reactions.iter().all(|r| *r == Reaction::default()));
    }

    #[test]
    fn test_overflow_drops_rest_of_batch() {
        let mut rig = Rig::new();
        rig.feed(b"N123\nN5\n");
        // "N12" echoed, '3' dropped and the remainder of the batch discarded.
        assert_eq!(rig.serial.as_slice(), b"N12");
        assert_eq!(rig.console.state().buffer.as_slice(), b"N12");
        assert_eq!(rig.config.window(), 10);

        // Next notification dispatches the buffered command.
        rig.feed(b"\n");
        assert_eq!(rig.config.window(), 12);
    }

    #[test]
    fn test_buffer_cleared_after_dispatch() {
        let (state, _) = run(b"N5\n");
        assert!(state.buffer.is_empty());
        assert_eq!(state.mode, Mode::Collecting);
    }
}
