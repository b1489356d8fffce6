//! Serial port emulation on stdio.
//!
//! Stdout is the transmit side. The receive interrupt is a reader thread: each
//! `read` from stdin is one batch of received bytes handed to the console.
//! When stdin is a terminal it is read in raw mode, so Ctrl+C and Ctrl+D
//! arrive as bytes and end the simulator.

use std::io::{self, Read, StdoutLock, Write};
use std::process;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use telemetry_common::config::SharedConfig;
use telemetry_common::console::{CommandConsole, ReporterControl};
use telemetry_common::format::ByteSink;

use crate::terminal;

/// Bytes read from stdin per batch (UART RX FIFO depth).
pub const RX_BATCH: usize = 16;

/// Raw-mode keys that quit: Ctrl+C and Ctrl+D.
pub const EXIT_KEYS: [u8; 2] = [0x03, 0x04];

/// Split a raw batch at the first exit key.
///
/// Returns the bytes before it and whether one was found.
pub fn split_exit(batch: &[u8]) -> (&[u8], bool) {
    match batch.iter().position(|b| EXIT_KEYS.contains(b)) {
        Some(at) => (&batch[..at], true),
        None => (batch, false),
    }
}

fn shutdown(code: i32) -> ! {
    if let Err(err) = terminal::restore_terminal() {
        warn!("serial: {err:#}");
    }
    process::exit(code)
}

/// Exclusive handle on stdout, flushed on drop.
pub struct StdoutSerial {
    out: StdoutLock<'static>,
    failed: bool,
}

impl StdoutSerial {
    pub fn lock() -> Self {
        Self {
            out: io::stdout().lock(),
            failed: false,
        }
    }

    fn write(
        &mut self,
        bytes: &[u8],
    ) {
        if self.failed {
            return;
        }
        if let Err(err) = self.out.write_all(bytes) {
            warn!("serial: write failed: {err}");
            self.failed = true;
        }
    }
}

impl ByteSink for StdoutSerial {
    fn put(
        &mut self,
        byte: u8,
    ) {
        self.write(&[byte]);
    }

    fn put_bytes(
        &mut self,
        bytes: &[u8],
    ) {
        self.write(bytes);
    }
}

impl Drop for StdoutSerial {
    fn drop(&mut self) { self.out.flush().ok(); }
}

/// Spawn the receive thread driving `console` until stdin closes.
///
/// With `raw` input an exit key or a read error restores the terminal and ends
/// the process.
pub fn spawn_receiver<R>(
    mut console: CommandConsole,
    config: &'static SharedConfig,
    reporter: &'static R,
    raw: bool,
) -> io::Result<JoinHandle<()>>
where
    R: ReporterControl + Sync,
{
    thread::Builder::new().name("uart-rx".into()).spawn(move || {
        info!("Serial receiver started");
        let mut stdin = io::stdin().lock();
        let mut batch = [0u8; RX_BATCH];
        loop {
            match stdin.read(&mut batch) {
                Ok(0) => {
                    debug!("serial: stdin closed");
                    break;
                }
                Ok(n) => {
                    let (bytes, exit) = if raw { split_exit(&batch[..n]) } else { (&batch[..n], false) };
                    console.on_bytes(bytes, config, reporter, &mut StdoutSerial::lock());
                    if exit {
                        info!("Exit key received");
                        shutdown(0);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!("serial: read failed: {err}");
                    if raw {
                        shutdown(1);
                    }
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_exit_keeps_bytes_before_key() {
        assert_eq!(split_exit(b"N5\r"), (&b"N5\r"[..], false));
        assert_eq!(split_exit(b"N5\x03top"), (&b"N5"[..], true));
        assert_eq!(split_exit(b"\x04"), (&b""[..], true));
    }
}
