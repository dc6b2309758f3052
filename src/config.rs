//! Configuration management for the replay engine.
//!
//! Loads and validates configuration from TOML files.

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Default values as constants
const DEFAULT_LOGS_DIR: &str = "logs";
const DEFAULT_LOG_PATTERN: &str = "app.log";
const DEFAULT_OFFSETS_DIR: &str = "offsets";
const DEFAULT_WORKER_COUNT: usize = 2;
const DEFAULT_SCAN_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory containing rotated log segments.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    /// Base log filename; only files matching `<log_pattern>.<suffix>` are
    /// eligible segments. The live file itself is never read.
    #[serde(default = "default_log_pattern")]
    pub log_pattern: String,
    /// Directory holding the persisted offset files.
    #[serde(default = "default_offsets_dir")]
    pub offsets_dir: String,
    /// Number of concurrent segment workers (DEFAULT: 2)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Period between logs-directory rescans in milliseconds (DEFAULT: 1000)
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            log_pattern: default_log_pattern(),
            offsets_dir: default_offsets_dir(),
            worker_count: DEFAULT_WORKER_COUNT,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
        }
    }
}

// Serde default functions (must be regular fn, not const fn)
fn default_logs_dir() -> String {
    DEFAULT_LOGS_DIR.to_string()
}
fn default_log_pattern() -> String {
    DEFAULT_LOG_PATTERN.to_string()
}
fn default_offsets_dir() -> String {
    DEFAULT_OFFSETS_DIR.to_string()
}
fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}
fn default_scan_interval_ms() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&raw)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.logs_dir.trim().is_empty() {
            anyhow::bail!("logs_dir cannot be empty");
        }
        if self.log_pattern.trim().is_empty() {
            anyhow::bail!("log_pattern cannot be empty");
        }
        if self.offsets_dir.trim().is_empty() {
            anyhow::bail!("offsets_dir cannot be empty");
        }
        if self.worker_count < 1 {
            anyhow::bail!("worker_count must be at least 1");
        }
        if self.scan_interval_ms == 0 {
            anyhow::bail!("scan_interval_ms must be greater than zero");
        }

        Ok(())
    }

    pub fn logs_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.logs_dir).as_ref())
    }

    pub fn offsets_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.offsets_dir).as_ref())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}
