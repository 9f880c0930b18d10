//! In-memory platform.
//!
//! Input is queued by the caller, output is captured as a string. Drives the
//! same runtime loop as a real terminal, which is what automation relies on.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::types::Size;

use super::Platform;

#[derive(Debug, Default)]
struct HeadlessState {
    input: VecDeque<u8>,
    output: String,
    size: Size,
    initialized: bool,
    clears: usize,
}

#[derive(Debug)]
pub struct HeadlessPlatform {
    state: Mutex<HeadlessState>,
    input_ready: Condvar,
}

impl HeadlessPlatform {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                size: Size::new(width, height),
                ..Default::default()
            }),
            input_ready: Condvar::new(),
        }
    }

    /// Queue bytes as if the user typed them.
    pub fn push_input(&self, bytes: impl AsRef<[u8]>) {
        self.state.lock().input.extend(bytes.as_ref());
        self.input_ready.notify_all();
    }

    pub fn set_size(&self, width: u16, height: u16) {
        self.state.lock().size = Size::new(width, height);
    }

    /// Everything written so far.
    pub fn output(&self) -> String {
        self.state.lock().output.clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.state.lock().output)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }
}

impl Platform for HeadlessPlatform {
    fn init(&self) -> io::Result<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.state.lock().initialized = false;
        self.input_ready.notify_all();
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        Ok(self.state.lock().size)
    }

    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.input.is_empty() {
            self.input_ready.wait_for(&mut state, timeout);
        }
        let n = buf.len().min(state.input.len());
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_string(&self, s: &str) -> io::Result<()> {
        self.state.lock().output.push_str(s);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.state.lock().clears += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_returns_queued_bytes() {
        let platform = HeadlessPlatform::new(80, 24);
        platform.push_input(b"abc");
        let mut buf = [0u8; 2];
        assert_eq!(platform.read_input(&mut buf, Duration::from_millis(1)).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(platform.read_input(&mut buf, Duration::from_millis(1)).unwrap(), 1);
        assert_eq!(buf[0], b'c');
    }

    #[test]
    fn test_read_times_out_empty() {
        let platform = HeadlessPlatform::new(80, 24);
        let mut buf = [0u8; 8];
        assert_eq!(platform.read_input(&mut buf, Duration::from_millis(5)).unwrap(), 0);
    }

    #[test]
    fn test_output_and_size() {
        let platform = HeadlessPlatform::new(80, 24);
        platform.init().unwrap();
        assert!(platform.is_initialized());
        platform.write_string("hello").unwrap();
        assert_eq!(platform.take_output(), "hello");
        assert_eq!(platform.output(), "");
        platform.set_size(100, 30);
        assert_eq!(platform.size().unwrap(), Size::new(100, 30));
        platform.close().unwrap();
        assert!(!platform.is_initialized());
    }
}
