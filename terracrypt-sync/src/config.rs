//! Sync engine configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-deployment tuning for the sync engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum time between two unforced pulls of the same kind (seconds).
    pub cooldown_secs: u64,

    /// Interval of the runner's opportunistic delta fetch (seconds).
    pub poll_interval_secs: u64,

    /// Capacity of the runner's command channel.
    pub command_buffer: usize,

    /// Capacity of the push-notification channel.
    pub push_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            poll_interval_secs: 60,
            command_buffer: 64,
            push_buffer: 512,
        }
    }
}

impl SyncConfig {
    /// Parses a deployment config; absent fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: SyncConfig =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        if config.poll_interval_secs == 0 {
            return Err(SyncError::Config("poll_interval_secs must be positive".into()));
        }
        if config.command_buffer == 0 || config.push_buffer == 0 {
            return Err(SyncError::Config("channel buffers must be positive".into()));
        }
        Ok(config)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
