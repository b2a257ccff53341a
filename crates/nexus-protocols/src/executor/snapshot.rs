//! Read-only view of a task handed to executors.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{TaskId, TaskType};

/// Parameters attached to a task.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Snapshot of a task at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub task_type: TaskType,
    pub description: String,
    pub parameters: Parameters,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl TaskSnapshot {
    /// Build a snapshot with default priority and no timeout.
    pub fn new(task_type: TaskType, description: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            description: description.into(),
            parameters,
            priority: 5,
            timeout_seconds: None,
            created_at: Utc::now(),
        }
    }

    /// Deserialize a parameter. Missing or mistyped values yield `None`.
    pub fn parameter<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.parameters
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn str_parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    /// True when the parameter is present and not null.
    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.get(key).is_some_and(|v| !v.is_null())
    }
}
