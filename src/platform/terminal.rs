//! Terminal setup and teardown.
//!
//! Raw mode, alternate screen, mouse tracking and bracketed paste go through
//! crossterm. Input is read straight from the stdin file descriptor so the
//! engine's own decoder sees the raw escape sequences.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    execute,
    terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

use crate::config::RuntimeConfig;
use crate::types::Size;

use super::Platform;

/// Real terminal on stdin/stdout.
pub struct TerminalPlatform {
    alternate_screen: bool,
    mouse_capture: bool,
    active: AtomicBool,
}

impl TerminalPlatform {
    pub fn new(alternate_screen: bool, mouse_capture: bool) -> Self {
        Self {
            alternate_screen,
            mouse_capture,
            active: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.alternate_screen, config.mouse_capture)
    }
}

impl Platform for TerminalPlatform {
    fn init(&self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        if self.alternate_screen {
            execute!(out, EnterAlternateScreen)?;
        }
        if self.mouse_capture {
            execute!(out, EnableMouseCapture)?;
        }
        execute!(out, EnableBracketedPaste, cursor::Hide, terminal::Clear(ClearType::All))?;
        self.active.store(true, Ordering::SeqCst);
        log::debug!("terminal initialized");
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut out = io::stdout();
        if self.mouse_capture {
            execute!(out, DisableMouseCapture)?;
        }
        execute!(out, DisableBracketedPaste, cursor::Show)?;
        if self.alternate_screen {
            execute!(out, LeaveAlternateScreen)?;
        }
        terminal::disable_raw_mode()?;
        log::debug!("terminal restored");
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        let (width, height) = terminal::size()?;
        Ok(Size::new(width, height))
    }

    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        read_stdin(buf, timeout)
    }

    fn write_string(&self, s: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(s.as_bytes())?;
        out.flush()
    }

    fn clear(&self) -> io::Result<()> {
        execute!(io::stdout(), terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

impl Drop for TerminalPlatform {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Put the terminal back into cooked mode no matter what state it is in.
/// Used by the crash hook, so every step ignores errors.
pub fn restore_terminal() {
    let mut out = io::stdout();
    let _ = execute!(
        out,
        DisableMouseCapture,
        DisableBracketedPaste,
        cursor::Show,
        LeaveAlternateScreen
    );
    let _ = terminal::disable_raw_mode();
    let _ = out.flush();
}

#[cfg(unix)]
fn read_stdin(buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
    let fd = libc::STDIN_FILENO;
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

    // SAFETY: pfd is a valid pollfd for the duration of the call.
    let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    if ready == 0 {
        return Ok(0);
    }

    // SAFETY: buf is valid for writes of buf.len() bytes.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    match n {
        n if n < 0 => Err(io::Error::last_os_error()),
        0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed")),
        n => Ok(n as usize),
    }
}

#[cfg(not(unix))]
fn read_stdin(buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
    use std::io::Read;
    // No timed read here; shutdown waits for the next key.
    match io::stdin().read(buf)? {
        0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed")),
        n => Ok(n),
    }
}
