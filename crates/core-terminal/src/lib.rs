//! Terminal mode handling and the blocking byte source.
//!
//! The editor paints inline (no alternate screen), so entering raw mode and
//! restoring it on every exit path is the whole job here. The guard is RAII:
//! dropping it restores cooked mode even when the caller unwinds.

use anyhow::Result;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Read};
use std::time::Duration;

/// RAII guard for raw mode. Restores the previous terminal mode on drop.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self { active: true })
    }

    /// Temporarily restore cooked mode (used around `$EDITOR`).
    pub fn suspend(&mut self) -> Result<()> {
        if self.active {
            disable_raw_mode()?;
            self.active = false;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.active {
            enable_raw_mode()?;
            self.active = true;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
        }
    }
}

/// Terminal size as `(columns, rows)`, with an 80x24 fallback when the
/// descriptor is not a tty (pipes in tests).
pub fn terminal_size() -> (u16, u16) {
    crossterm::terminal::size().unwrap_or((80, 24))
}

/// Wait up to `timeout` for stdin to become readable. Used to tell a lone
/// ESC from the start of an escape sequence.
#[cfg(unix)]
pub fn poll_stdin(timeout: Duration) -> io::Result<bool> {
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    let mut pollfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: pollfd points at a single valid struct for the duration of
    // the call.
    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(result > 0)
}

#[cfg(not(unix))]
pub fn poll_stdin(_timeout: Duration) -> io::Result<bool> {
    // Without poll, report data available and let the blocking read decide.
    Ok(true)
}

/// Blocking stdin byte source consumed by the input decoder.
pub struct StdinBytes {
    stdin: io::Stdin,
}

impl Default for StdinBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinBytes {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }

    /// Read at least one byte (blocking), up to `buf.len()`. Returns 0 on
    /// end of input.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.stdin.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
