//! Terminal lifecycle for the serial console and the OLED view.
//!
//! - Raw mode on stdin so single keystrokes reach the console unechoed
//! - A fixed region at the top of the screen for the OLED frame, kept out of
//!   the scrolling area used by serial output and logs
//!
//! Both are undone by `restore_terminal()`, which is also run from the panic
//! hook and on every exit path of the receiver.

use std::fmt;
use std::io::{self, IsTerminal};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::Command;

static RAW_MODE: AtomicBool = AtomicBool::new(false);
static REGION_RESERVED: AtomicBool = AtomicBool::new(false);

/// Rows that must remain for the scrolling area below the OLED region.
pub const MIN_SCROLL_ROWS: u16 = 4;

/// DECSTBM: limit scrolling to rows `top..=bottom` (0-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetScrollRegion {
    pub top: u16,
    pub bottom: u16,
}

impl Command for SetScrollRegion {
    fn write_ansi(
        &self,
        f: &mut impl fmt::Write,
    ) -> fmt::Result {
        write!(f, "\x1b[{};{}r", self.top + 1, self.bottom + 1)
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "scroll regions need an ANSI terminal"))
    }
}

/// DECSTBM with no arguments: scroll the whole screen again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetScrollRegion;

impl Command for ResetScrollRegion {
    fn write_ansi(
        &self,
        f: &mut impl fmt::Write,
    ) -> fmt::Result {
        f.write_str("\x1b[r")
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "scroll regions need an ANSI terminal"))
    }
}

/// Put stdin in raw mode when it is a terminal.
///
/// Returns `false` (and leaves the terminal alone) for piped input.
///
/// # Errors
/// Returns an error if raw mode cannot be enabled.
pub fn enable_console_input() -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }
    enable_raw_mode().context("Failed to enable raw mode")?;
    RAW_MODE.store(true, Ordering::Release);
    Ok(true)
}

/// Reserve the top `rows` of the screen for the OLED view.
///
/// The screen is cleared and scrolling is confined to the rows below.
/// Returns `false` when stderr is not a terminal or the screen is too short.
///
/// # Errors
/// Returns an error if the terminal size cannot be read or the commands fail.
pub fn reserve_display_rows(rows: u16) -> Result<bool> {
    let mut stderr = io::stderr();
    if !stderr.is_terminal() {
        return Ok(false);
    }
    let (_, height) = terminal::size().context("Failed to read terminal size")?;
    if height < rows + MIN_SCROLL_ROWS {
        return Ok(false);
    }
    execute!(
        stderr,
        Clear(ClearType::All),
        SetScrollRegion {
            top: rows,
            bottom: height - 1,
        },
        MoveTo(0, rows)
    )
    .context("Failed to reserve display rows")?;
    REGION_RESERVED.store(true, Ordering::Release);
    Ok(true)
}

/// Restores terminal state.
///
/// - Gives the reserved rows back to the scrolling area
/// - Disables raw mode
///
/// This function is idempotent and safe to call multiple times.
///
/// # Errors
/// Returns an error if raw mode cannot be disabled.
pub fn restore_terminal() -> Result<()> {
    if REGION_RESERVED.swap(false, Ordering::AcqRel) {
        let rows = terminal::size().map_or(0, |(_, height)| height.saturating_sub(1));
        let _ = execute!(io::stderr(), ResetScrollRegion, MoveTo(0, rows));
    }
    if RAW_MODE.swap(false, Ordering::AcqRel) {
        disable_raw_mode().context("Failed to disable raw mode")?;
    }
    Ok(())
}

/// Installs a panic hook that restores the terminal before printing the panic.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ansi(command: impl Command) -> String {
        let mut out = String::new();
        command.write_ansi(&mut out).unwrap();
        out
    }

    #[test]
    fn test_scroll_region_is_one_based() {
        assert_eq!(ansi(SetScrollRegion { top: 10, bottom: 39 }), "\x1b[11;40r");
        assert_eq!(ansi(ResetScrollRegion), "\x1b[r");
    }

    #[test]
    fn test_restore_without_setup_is_noop() {
        restore_terminal().unwrap();
        restore_terminal().unwrap();
        assert!(!RAW_MODE.load(Ordering::Acquire));
    }
}
