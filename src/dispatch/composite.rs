//! Composable concurrency primitives.
//!
//! Everything is a [`Unit`]: a piece of async work that observes a
//! [`CancellationToken`]. Composites are units themselves, so they nest:
//!
//! ```text
//! timeout(retry(sequential([a, b]), 3, 50ms), 1s)
//! ```
//!
//! Cancellation is cooperative. The token is checked before a unit starts;
//! a unit that is already running is never aborted from outside.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait Unit: Send + Sync {
    async fn run(&self, cancel: &CancellationToken) -> Result<()>;

    /// Label used in logs.
    fn name(&self) -> &str {
        "unit"
    }
}

pub type UnitRef = Arc<dyn Unit>;

/// Map a failed join. Panics keep unwinding in the caller.
fn join_error(err: JoinError) -> EngineError {
    match err.try_into_panic() {
        Ok(payload) => std::panic::resume_unwind(payload),
        Err(_) => EngineError::Canceled,
    }
}

// =============================================================================
// CLOSURE UNIT
// =============================================================================

type UnitFn = dyn Fn(CancellationToken) -> BoxFuture<'static, Result<()>> + Send + Sync;

pub struct FnUnit {
    name: String,
    f: Box<UnitFn>,
}

#[async_trait]
impl Unit for FnUnit {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        (self.f)(cancel.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Turn an async closure into a unit.
pub fn unit_fn<F, Fut>(name: impl Into<String>, f: F) -> UnitRef
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnUnit {
        name: name.into(),
        f: Box::new(move |token| f(token).boxed()),
    })
}

// =============================================================================
// SEQUENTIAL
// =============================================================================

/// Runs units in order. Stops at the first non-recoverable error; a unit
/// that reports cancellation is skipped over.
pub struct Sequential {
    units: Vec<UnitRef>,
}

impl Sequential {
    pub fn new(units: impl IntoIterator<Item = UnitRef>) -> Self {
        Self {
            units: units.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Unit for Sequential {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        for unit in &self.units {
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            match unit.run(cancel).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    log::debug!("sequential: {} reported {e}, continuing", unit.name());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

// =============================================================================
// CONCURRENT
// =============================================================================

/// Runs every unit on its own task and waits for all of them. Failures are
/// gathered into one composite error.
pub struct Concurrent {
    units: Vec<UnitRef>,
}

impl Concurrent {
    pub fn new(units: impl IntoIterator<Item = UnitRef>) -> Self {
        Self {
            units: units.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Unit for Concurrent {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let total = self.units.len();
        let mut errors = Vec::new();
        let mut handles = Vec::with_capacity(total);

        for unit in &self.units {
            if cancel.is_cancelled() {
                errors.push(EngineError::Canceled);
                continue;
            }
            let unit = unit.clone();
            let token = cancel.child_token();
            handles.push(tokio::spawn(async move { unit.run(&token).await }));
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(join_error(e)),
            }
        }

        match EngineError::composite(errors, total) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "concurrent"
    }
}

/// [`Concurrent`] with at most `limit` units running at once.
pub struct Bounded {
    units: Vec<UnitRef>,
    limit: usize,
}

impl Bounded {
    pub fn new(units: impl IntoIterator<Item = UnitRef>, limit: usize) -> Self {
        Self {
            units: units.into_iter().collect(),
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl Unit for Bounded {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let total = self.units.len();
        let permits = Arc::new(Semaphore::new(self.limit));

        let handles: Vec<_> = self
            .units
            .iter()
            .map(|unit| {
                let unit = unit.clone();
                let token = cancel.child_token();
                let permits = permits.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return Err(EngineError::Canceled);
                    };
                    // Waiting for a permit counts as "not started yet".
                    if token.is_cancelled() {
                        return Err(EngineError::Canceled);
                    }
                    unit.run(&token).await
                })
            })
            .collect();

        let mut errors = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(join_error(e)),
            }
        }

        match EngineError::composite(errors, total) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "bounded"
    }
}

// =============================================================================
// RETRY
// =============================================================================

/// Re-runs a unit up to `attempts` times with a fixed delay in between.
pub struct Retry {
    unit: UnitRef,
    attempts: u32,
    delay: Duration,
}

impl Retry {
    pub fn new(unit: UnitRef, attempts: u32, delay: Duration) -> Self {
        Self {
            unit,
            attempts: attempts.max(1),
            delay,
        }
    }
}

#[async_trait]
impl Unit for Retry {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let mut last = EngineError::Canceled;

        for attempt in 1..=self.attempts {
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            match self.unit.run(cancel).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!(
                        "retry: {} attempt {attempt}/{} failed: {e}",
                        self.unit.name(),
                        self.attempts
                    );
                    last = e;
                }
            }
            if attempt < self.attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = cancel.cancelled() => return Err(EngineError::Canceled),
                }
            }
        }

        Err(EngineError::Exhausted {
            attempts: self.attempts,
            last: Box::new(last),
        })
    }

    fn name(&self) -> &str {
        "retry"
    }
}

// =============================================================================
// TIMEOUT
// =============================================================================

/// Races a unit against a deadline. On expiry the unit keeps running
/// detached; only the caller stops waiting.
pub struct Timeout {
    unit: UnitRef,
    duration: Duration,
}

impl Timeout {
    pub fn new(unit: UnitRef, duration: Duration) -> Self {
        Self { unit, duration }
    }
}

#[async_trait]
impl Unit for Timeout {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Canceled);
        }
        let unit = self.unit.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { unit.run(&token).await });

        match tokio::time::timeout(self.duration, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(join_error(e)),
            Err(_) => {
                log::debug!("timeout: {} exceeded {:?}", self.unit.name(), self.duration);
                Err(EngineError::Timeout(self.duration))
            }
        }
    }

    fn name(&self) -> &str {
        "timeout"
    }
}

// =============================================================================
// FALLBACK
// =============================================================================

/// Runs `secondary` only when `primary` fails.
pub struct Fallback {
    primary: UnitRef,
    secondary: UnitRef,
}

impl Fallback {
    pub fn new(primary: UnitRef, secondary: UnitRef) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Unit for Fallback {
    async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Canceled);
        }
        match self.primary.run(cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("fallback: {} failed ({e}), running {}", self.primary.name(), self.secondary.name());
                if cancel.is_cancelled() {
                    return Err(EngineError::Canceled);
                }
                self.secondary.run(cancel).await
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

pub fn sequential(units: impl IntoIterator<Item = UnitRef>) -> UnitRef {
    Arc::new(Sequential::new(units))
}

pub fn concurrent(units: impl IntoIterator<Item = UnitRef>) -> UnitRef {
    Arc::new(Concurrent::new(units))
}

pub fn bounded(units: impl IntoIterator<Item = UnitRef>, limit: usize) -> UnitRef {
    Arc::new(Bounded::new(units, limit))
}

pub fn retry(unit: UnitRef, attempts: u32, delay: Duration) -> UnitRef {
    Arc::new(Retry::new(unit, attempts, delay))
}

pub fn timeout(unit: UnitRef, duration: Duration) -> UnitRef {
    Arc::new(Timeout::new(unit, duration))
}

pub fn fallback(primary: UnitRef, secondary: UnitRef) -> UnitRef {
    Arc::new(Fallback::new(primary, secondary))
}
