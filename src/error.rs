//! Engine errors.
//!
//! Layout and focus never fail: they report absence with `bool`/`Option`.
//! Dispatch, composites, persistence and the automation surface return
//! [`EngineError`] so the caller can branch on [`ErrorKind`].

use std::time::Duration;

use thiserror::Error;

/// Branchable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotAllowed,
    InvalidPayload,
    Timeout,
    Composite,
    Canceled,
    Io,
    Serialization,
    Config,
    Panicked,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("invalid payload: expected {expected}, got {actual}")]
    InvalidPayload { expected: &'static str, actual: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{} of {total} units failed; first: {primary}", errors.len())]
    Composite {
        primary: Box<EngineError>,
        errors: Vec<EngineError>,
        total: usize,
    },

    #[error("canceled")]
    Canceled,

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<EngineError> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("task {task} panicked: {message}")]
    TaskPanicked { task: String, message: String },
}

impl EngineError {
    /// Category of this error. Retry exhaustion reports the kind of the last failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotAllowed(_) => ErrorKind::NotAllowed,
            Self::InvalidPayload { .. } => ErrorKind::InvalidPayload,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Composite { .. } => ErrorKind::Composite,
            Self::Canceled => ErrorKind::Canceled,
            Self::Exhausted { last, .. } => last.kind(),
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Config(_) => ErrorKind::Config,
            Self::TaskPanicked { .. } => ErrorKind::Panicked,
        }
    }

    /// Only cooperative cancellation is recoverable inside a sequence.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Build a composite error from child failures. The first failure is the primary cause.
    pub fn composite(mut errors: Vec<EngineError>, total: usize) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let primary = errors.remove(0);
        Some(Self::Composite {
            primary: Box::new(primary),
            errors,
            total,
        })
    }

    /// Number of child failures carried by a composite (1 for any other error).
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Composite { errors, .. } => errors.len() + 1,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
