//! Command executor settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use nexus_protocols::ExecutorError;

/// Settings resolved from the executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSettings {
    /// Timeout applied when a task specifies none.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Ceiling for any task timeout.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,

    /// Run commands through `sh -c` by default.
    #[serde(default)]
    pub shell: bool,

    #[serde(default = "default_capture_output")]
    pub capture_output: bool,

    /// Wait between SIGTERM and SIGKILL.
    #[serde(default = "default_termination_grace_seconds")]
    pub termination_grace_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_timeout_seconds() -> u64 {
    3600
}

fn default_capture_output() -> bool {
    true
}

fn default_termination_grace_seconds() -> u64 {
    5
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_timeout_seconds(),
            max_timeout_seconds: default_max_timeout_seconds(),
            shell: false,
            capture_output: default_capture_output(),
            termination_grace_seconds: default_termination_grace_seconds(),
        }
    }
}

impl CommandSettings {
    /// Parse and validate settings from a config object.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, ExecutorError> {
        let settings: Self = match config {
            serde_json::Value::Null => Self::default(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| ExecutorError::InvalidConfig(e.to_string()))?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ExecutorError> {
        if self.default_timeout_seconds == 0 {
            return Err(ExecutorError::InvalidConfig(
                "default_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.max_timeout_seconds < self.default_timeout_seconds {
            return Err(ExecutorError::InvalidConfig(format!(
                "max_timeout_seconds ({}) is below default_timeout_seconds ({})",
                self.max_timeout_seconds, self.default_timeout_seconds
            )));
        }
        Ok(())
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_seconds)
    }

    /// Effective timeout: the requested value, else the default, capped at the max.
    pub fn resolve_timeout(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_timeout_seconds)
            .min(self.max_timeout_seconds)
    }
}
