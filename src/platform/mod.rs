//! Platform - where bytes come from and where frames go
//!
//! The engine only talks to the outside world through [`Platform`]:
//!
//! ```text
//! read_input ──► InputDecoder ──► Keymap ──► Dispatcher
//!                                                 │
//! write_string ◄── DiffRenderer ◄── Buffer ◄── paint
//! ```
//!
//! [`TerminalPlatform`] drives a real tty through crossterm.
//! [`HeadlessPlatform`] keeps everything in memory for automation and tests.

mod headless;
mod terminal;

use std::io;
use std::time::Duration;

use crate::types::Size;

pub use headless::HeadlessPlatform;
pub use terminal::{TerminalPlatform, restore_terminal};

/// Source of raw input and sink for rendered text.
///
/// Methods take `&self`: the input task reads while the main loop writes.
pub trait Platform: Send + Sync {
    /// Enter raw mode and whatever screen modes the platform supports.
    fn init(&self) -> io::Result<()>;

    /// Undo everything `init` did. Safe to call more than once.
    fn close(&self) -> io::Result<()>;

    fn size(&self) -> io::Result<Size>;

    /// Read available bytes, waiting at most `timeout`. `Ok(0)` means nothing arrived.
    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    fn write_string(&self, s: &str) -> io::Result<()>;

    fn clear(&self) -> io::Result<()>;
}
