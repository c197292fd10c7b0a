//! Configuration management.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Sysfs directory of the AS3677 device
    #[serde(default = "default_device")]
    pub device: String,

    /// Polling interval in milliseconds
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    /// Number of events buffered before the oldest is dropped
    #[serde(default = "default_fifo_capacity")]
    pub fifo_capacity: usize,

    /// How often queued events are written out, in milliseconds
    #[serde(default = "default_drain_interval")]
    pub drain_interval_ms: u64,
}

// Default value functions
fn default_device() -> String {
    als_hw::AS3677_DEV.to_string()
}

fn default_delay() -> u64 {
    200
}

fn default_fifo_capacity() -> usize {
    als_hw::fifo::DEFAULT_FIFO_CAPACITY
}

fn default_drain_interval() -> u64 {
    100
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Polling interval in nanoseconds.
    pub fn delay_ns(&self) -> i64 {
        i64::try_from(self.delay_ms.saturating_mul(1_000_000)).unwrap_or(i64::MAX)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            delay_ms: default_delay(),
            fifo_capacity: default_fifo_capacity(),
            drain_interval_ms: default_drain_interval(),
        }
    }
}
