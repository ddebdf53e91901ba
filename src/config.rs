//! Runtime configuration.
//!
//! Defaults can be overridden through environment variables:
//! - `TASKDECK_HOME` - data directory (default `~/.taskdeck`)
//! - `TASKDECK_QUOTA_BYTES` - storage quota in bytes (default 5 MiB)
//! - `TASKDECK_FLUSH_MS` - persistence flush interval in milliseconds (default 1000)

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub quota_bytes: usize,
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Config {
            data_dir: PathBuf::from(home).join(".taskdeck"),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Unparseable values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(dir) = lookup("TASKDECK_HOME").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("TASKDECK_QUOTA_BYTES") {
            match raw.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => config.quota_bytes = bytes,
                _ => tracing::warn!(value = %raw, "Ignoring invalid TASKDECK_QUOTA_BYTES"),
            }
        }
        if let Some(raw) = lookup("TASKDECK_FLUSH_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.flush_interval = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TASKDECK_FLUSH_MS"),
            }
        }
        config
    }
}
