//! Engine and worker pool configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use nexus_config::EngineConfig;

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of workers in the pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long an idle worker waits before polling again.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Upper bound on waiting for workers when the pool stops.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Executors loaded and activated on engine start.
    #[serde(default)]
    pub default_executors: Vec<String>,
}

fn default_workers() -> usize {
    3
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl QueueConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            idle_backoff_ms: default_idle_backoff_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            default_executors: Vec::new(),
        }
    }
}

impl From<&EngineConfig> for QueueConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            workers: config.workers,
            idle_backoff_ms: config.idle_backoff_ms,
            shutdown_grace_secs: config.shutdown_grace_secs,
            default_executors: config.default_executors.clone(),
        }
    }
}
