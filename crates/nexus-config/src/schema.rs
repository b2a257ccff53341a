//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    /// Per-executor tables merged over manifest config, keyed by executor id.
    #[serde(default)]
    pub executors: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Configuration table for one executor, if any.
    pub fn executor(&self, id: &str) -> Option<&serde_json::Value> {
        self.executors.get(id)
    }
}

/// Worker pool and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Executors loaded and activated when the engine starts.
    #[serde(default = "default_executors")]
    pub default_executors: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            idle_backoff_ms: default_idle_backoff_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            default_executors: default_executors(),
        }
    }
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

fn default_executors() -> Vec<String> {
    vec!["command_executor".to_string()]
}

/// Manifest discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Root of a `<kind>/<name>/manifest.yaml` tree. Supports `~`.
    #[serde(default)]
    pub directory: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily-rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
