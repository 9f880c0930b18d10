//! Managed-lifetime task spawner.
//!
//! Every task gets the runtime's [`CancellationToken`] and is tracked so
//! shutdown can wait for it. A panic inside a task is caught at the task
//! boundary, logged, and turns into a runtime-wide cancel so the main loop
//! winds down and restores the terminal. The first panic is kept so the
//! owner can report it once shutdown is done.

use std::future::Future;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{EngineError, Result};

use super::recovery::panic_message;

#[derive(Debug, Clone, Default)]
pub struct TaskSpawner {
    token: CancellationToken,
    tracker: TaskTracker,
    panicked: Arc<Mutex<Option<EngineError>>>,
}

impl TaskSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Take the first task panic recorded since the last call.
    pub fn take_panic(&self) -> Option<EngineError> {
        self.panicked.lock().take()
    }

    pub fn spawn<F, Fut>(&self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        let panicked = self.panicked.clone();
        let fut = f(token.clone());
        self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                record_panic(&panicked, name, panic);
                token.cancel();
            }
        });
    }

    /// Run blocking work (the input reader) on the blocking pool.
    pub fn spawn_blocking<F>(&self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let token = self.token.clone();
        let panicked = self.panicked.clone();
        self.tracker.spawn_blocking(move || {
            let inner = token.clone();
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(move || f(inner))) {
                record_panic(&panicked, name, panic);
                token.cancel();
            }
        });
    }

    /// Cancel everything and wait up to `timeout` for tasks to exit.
    /// Tasks still running after that are abandoned and `Timeout` is returned.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.token.cancel();
        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                log::debug!("all tasks stopped");
                Ok(())
            }
            Err(_) => {
                log::warn!("shutdown: {} tasks still running after {timeout:?}", self.tracker.len());
                Err(EngineError::Timeout(timeout))
            }
        }
    }
}

fn record_panic(slot: &Mutex<Option<EngineError>>, name: &str, panic: Box<dyn Any + Send>) {
    let message = panic_message(panic.as_ref());
    log::error!("task {name} panicked: {message}");
    slot.lock().get_or_insert(EngineError::TaskPanicked {
        task: name.to_string(),
        message,
    });
}
