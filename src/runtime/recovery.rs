//! Crash recovery.
//!
//! The panic hook runs before any unwinding, on whichever thread panicked:
//! 1. Restore the terminal (cooked mode, main screen, cursor, mouse off)
//! 2. Build a [`CrashReport`] and write it to the configured path, or stderr
//! 3. Hand over to the previous hook, or abort, per [`PanicPolicy`]

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::panic::PanicHookInfo;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{PanicPolicy, RuntimeConfig};
use crate::platform::restore_terminal;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Environment variables worth having in a terminal crash report.
const ENV_KEYS: &[&str] = &["TERM", "COLORTERM", "TERM_PROGRAM", "LANG", "LC_ALL", "SHELL"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub location: Option<String>,
    pub thread: Option<String>,
    pub backtrace: String,
    pub env: BTreeMap<String, String>,
}

impl CrashReport {
    pub fn new(message: impl Into<String>, location: Option<String>) -> Self {
        let mut env: BTreeMap<String, String> = ENV_KEYS
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();
        env.insert("os".into(), std::env::consts::OS.into());
        env.insert("arch".into(), std::env::consts::ARCH.into());
        env.insert("version".into(), env!("CARGO_PKG_VERSION").into());

        Self {
            timestamp: Utc::now(),
            message: message.into(),
            location,
            thread: std::thread::current().name().map(str::to_string),
            backtrace: Backtrace::force_capture().to_string(),
            env,
        }
    }

    fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        Self::new(panic_message(info.payload()), location)
    }

    /// Append the report as one JSON document followed by a newline.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{json}")?;
        file.sync_all()
    }

    pub fn summary(&self) -> String {
        match &self.location {
            Some(loc) => format!("panic at {loc}: {}", self.message),
            None => format!("panic: {}", self.message),
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Install the recovery hook once per process. Later calls are ignored, so
/// the policy and report path of the first caller stay in effect.
pub fn install_panic_hook(config: &RuntimeConfig) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        log::debug!("panic hook already installed");
        return;
    }

    let policy = config.panic_policy;
    let report_path = config.crash_report_path.clone();
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();

        let report = CrashReport::from_panic(info);
        log::error!("{}", report.summary());
        match &report_path {
            Some(path) => {
                if let Err(e) = report.write_to(path) {
                    eprintln!("failed to write crash report to {}: {e}", path.display());
                }
            }
            None => eprintln!("{}\n{}", report.summary(), report.backtrace),
        }

        match policy {
            PanicPolicy::Propagate => previous(info),
            PanicPolicy::Abort => std::process::abort(),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(s.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_report_contents() {
        let report = CrashReport::new("index out of bounds", Some("src/lib.rs:1:1".into()));
        assert_eq!(report.summary(), "panic at src/lib.rs:1:1: index out of bounds");
        assert_eq!(report.env.get("os").map(String::as_str), Some(std::env::consts::OS));
        assert!(report.env.contains_key("version"));
    }

    #[test]
    fn test_report_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.log");
        CrashReport::new("first", None).write_to(&path).unwrap();
        CrashReport::new("second", None).write_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"message\": \"first\""));
        assert!(text.contains("\"message\": \"second\""));
    }
}
