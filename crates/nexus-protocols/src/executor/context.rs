//! Executor context.

use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Context provided to executors during initialization.
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    /// Effective configuration: manifest defaults overlaid with overrides.
    pub config: serde_json::Value,

    /// Working directory for the executor.
    pub work_dir: PathBuf,
}

impl ExecutorContext {
    pub fn new(config: serde_json::Value, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
        }
    }

    /// Deserialize the whole configuration into a typed settings struct.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.config.clone())
    }

    /// Get a single configuration value.
    pub fn get_config<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
