//! Runtime configuration.
//!
//! Loaded from TOML; every field has a default so partial files work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// What the recovery hook does after restoring the terminal and writing the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PanicPolicy {
    /// Hand the panic to the previous hook and keep unwinding.
    #[default]
    Propagate,
    /// Terminate the process immediately.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Main loop tick in milliseconds.
    pub tick_rate_ms: u64,
    /// How long a single platform read waits before re-checking for shutdown.
    pub input_poll_ms: u64,
    /// Capacity of the decoded-input queue between the reader task and the main loop.
    pub input_queue_capacity: usize,
    /// How long the reader blocks on a full queue before flagging back-pressure and retrying.
    pub input_push_timeout_ms: u64,
    /// Maximum undo entries kept by the state tracker.
    pub history_capacity: usize,
    /// Maximum cached layout results.
    pub layout_cache_capacity: usize,
    /// Upper bound on waiting for spawned tasks during shutdown.
    pub shutdown_timeout_ms: u64,
    /// Poll interval for automation `wait_for`.
    pub wait_poll_ms: u64,
    /// Log actions nobody handled.
    pub log_unhandled: bool,
    pub mouse_capture: bool,
    pub alternate_screen: bool,
    pub panic_policy: PanicPolicy,
    /// Install the process-wide recovery hook when `run` starts. The hook is
    /// installed at most once per process and the first config wins, so
    /// embedders and test harnesses that own the hook turn this off.
    pub install_panic_hook: bool,
    /// Where crash diagnostics are written. Stderr only when unset.
    pub crash_report_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 16,
            input_poll_ms: 20,
            input_queue_capacity: 256,
            input_push_timeout_ms: 10,
            history_capacity: 100,
            layout_cache_capacity: 64,
            shutdown_timeout_ms: 1000,
            wait_poll_ms: 10,
            log_unhandled: true,
            mouse_capture: true,
            alternate_screen: true,
            panic_policy: PanicPolicy::default(),
            install_panic_hook: true,
            crash_report_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_ms == 0 {
            return Err(EngineError::Config("tick_rate_ms must be positive".into()));
        }
        if self.input_queue_capacity == 0 {
            return Err(EngineError::Config("input_queue_capacity must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::Config("history_capacity must be positive".into()));
        }
        if self.layout_cache_capacity == 0 {
            return Err(EngineError::Config("layout_cache_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn input_poll(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms)
    }

    pub fn input_push_timeout(&self) -> Duration {
        Duration::from_millis(self.input_push_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            tick_rate_ms = 33
            panic_policy = "abort"
            "#,
        )
        .unwrap();

        assert_eq!(config.tick_rate_ms, 33);
        assert_eq!(config.panic_policy, PanicPolicy::Abort);
        assert_eq!(config.input_queue_capacity, 256);
    }

    #[test]
    fn test_panic_hook_opt_out() {
        assert!(RuntimeConfig::default().install_panic_hook);
        let config = RuntimeConfig::from_toml_str("install_panic_hook = false").unwrap();
        assert!(!config.install_panic_hook);
        assert_eq!(config.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RuntimeConfig::from_toml_str("history_capacity = 0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = RuntimeConfig::from_toml_str("tick_rate_ms = \"fast\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = RuntimeConfig::default();
        config.crash_report_path = Some(PathBuf::from("/tmp/crash.log"));
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("tick_rate_ms = 16"));
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "wait_poll_ms = 5\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.wait_poll(), Duration::from_millis(5));
    }
}
