//! Background input reader.
//!
//! Owns the decoder and loops on `Platform::read_input` with a short poll
//! timeout so it can observe cancellation. Decoded events go onto a bounded
//! queue. When the queue is full the reader blocks in short slices instead of
//! dropping input, and raises the [`Backpressure`] flag so the main loop can
//! skip a render frame and catch up.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;

use crate::platform::Platform;
use crate::types::Size;

use super::parser::{InputDecoder, RawInput};

const READ_BUFFER: usize = 1024;

/// Shared "the input queue was full" signal.
#[derive(Debug, Clone, Default)]
pub struct Backpressure {
    raised: Arc<AtomicBool>,
    stalls: Arc<AtomicU64>,
}

impl Backpressure {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::Release);
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Total number of push attempts that hit a full queue.
    pub fn stalls(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }
}

pub struct InputReader {
    platform: Arc<dyn Platform>,
    decoder: InputDecoder,
    tx: mpsc::Sender<RawInput>,
    backpressure: Backpressure,
    poll_timeout: Duration,
    push_timeout: Duration,
    last_size: Option<Size>,
}

impl InputReader {
    pub fn new(
        platform: Arc<dyn Platform>,
        tx: mpsc::Sender<RawInput>,
        backpressure: Backpressure,
        poll_timeout: Duration,
        push_timeout: Duration,
    ) -> Self {
        let last_size = platform.size().ok();
        Self {
            platform,
            decoder: InputDecoder::new(),
            tx,
            backpressure,
            poll_timeout,
            push_timeout,
            last_size,
        }
    }

    /// Blocking read loop. Returns when `token` is cancelled, the queue is
    /// closed, or the platform reports a read error.
    pub fn run(mut self, token: CancellationToken, handle: Handle) {
        let mut buf = [0u8; READ_BUFFER];
        log::debug!("input reader started");

        while !token.is_cancelled() {
            let mut events = Vec::new();

            if let Ok(size) = self.platform.size() {
                if self.last_size != Some(size) {
                    self.last_size = Some(size);
                    events.push(RawInput::Resize(size));
                }
            }

            match self.platform.read_input(&mut buf, self.poll_timeout) {
                Ok(0) => {
                    if self.decoder.has_pending() {
                        events.extend(self.decoder.flush_pending());
                    }
                }
                Ok(n) => events.extend(self.decoder.feed(&buf[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::error!("input read failed: {e}");
                    break;
                }
            }

            for event in events {
                if !self.push(event, &token, &handle) {
                    log::debug!("input reader stopping, queue closed or cancelled");
                    return;
                }
            }
        }

        log::debug!("input reader stopped");
    }

    /// Block until the event is queued. False if the loop should stop.
    fn push(&self, mut event: RawInput, token: &CancellationToken, handle: &Handle) -> bool {
        loop {
            match handle.block_on(self.tx.send_timeout(event, self.push_timeout)) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    self.backpressure.raise();
                    if token.is_cancelled() {
                        return false;
                    }
                    event = back;
                }
                Err(SendTimeoutError::Closed(_)) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyCode, KeyEvent, Modifier};
    use crate::platform::HeadlessPlatform;

    fn setup(capacity: usize) -> (Arc<HeadlessPlatform>, mpsc::Receiver<RawInput>, InputReader, Backpressure) {
        let platform = Arc::new(HeadlessPlatform::new(80, 24));
        let (tx, rx) = mpsc::channel(capacity);
        let backpressure = Backpressure::new();
        let reader = InputReader::new(
            platform.clone(),
            tx,
            backpressure.clone(),
            Duration::from_millis(5),
            Duration::from_millis(5),
        );
        (platform, rx, reader, backpressure)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reader_decodes_and_queues() {
        let (platform, mut rx, reader, _) = setup(16);
        let token = CancellationToken::new();
        let handle = Handle::current();
        let task = {
            let token = token.clone();
            tokio::task::spawn_blocking(move || reader.run(token, handle))
        };

        platform.push_input(b"hi");
        let first = rx.recv().await.unwrap();
        assert_eq!(first, RawInput::Key(KeyEvent::new(KeyCode::Char('h'), Modifier::NONE)));
        let second = rx.recv().await.unwrap();
        assert_eq!(second, RawInput::Key(KeyEvent::new(KeyCode::Char('i'), Modifier::NONE)));

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reader_reports_resize() {
        let (platform, mut rx, reader, _) = setup(16);
        let token = CancellationToken::new();
        let handle = Handle::current();
        let task = {
            let token = token.clone();
            tokio::task::spawn_blocking(move || reader.run(token, handle))
        };

        platform.set_size(100, 40);
        let event = rx.recv().await.unwrap();
        assert_eq!(event, RawInput::Resize(Size::new(100, 40)));

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_queue_blocks_without_dropping() {
        let (platform, mut rx, reader, backpressure) = setup(1);
        let token = CancellationToken::new();
        let handle = Handle::current();
        let task = {
            let token = token.clone();
            tokio::task::spawn_blocking(move || reader.run(token, handle))
        };

        platform.push_input(b"abc");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backpressure.is_raised());
        assert!(backpressure.stalls() > 0);

        let mut got = String::new();
        for _ in 0..3 {
            if let Some(RawInput::Key(KeyEvent { code: KeyCode::Char(c), .. })) = rx.recv().await {
                got.push(c);
            }
        }
        assert_eq!(got, "abc");
        assert!(backpressure.take());
        assert!(!backpressure.is_raised());

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lone_escape_flushed_after_timeout() {
        let (platform, mut rx, reader, _) = setup(4);
        let token = CancellationToken::new();
        let handle = Handle::current();
        let task = {
            let token = token.clone();
            tokio::task::spawn_blocking(move || reader.run(token, handle))
        };

        platform.push_input(b"\x1b");
        let event = rx.recv().await.unwrap();
        assert_eq!(event, RawInput::Key(KeyEvent::new(KeyCode::Escape, Modifier::NONE)));

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_paste_split_across_reads_arrives_whole() {
        let (platform, mut rx, reader, _) = setup(4);
        let token = CancellationToken::new();
        let handle = Handle::current();
        let task = {
            let token = token.clone();
            tokio::task::spawn_blocking(move || reader.run(token, handle))
        };

        platform.push_input(b"\x1b[200~h\xc3\xa9");
        // Several poll timeouts pass with the paste still open.
        tokio::time::sleep(Duration::from_millis(50)).await;
        platform.push_input(b"llo\x1b[201~");

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, RawInput::Paste("h\u{e9}llo".into()));
        assert!(rx.try_recv().is_err());

        token.cancel();
        task.await.unwrap();
    }
}
