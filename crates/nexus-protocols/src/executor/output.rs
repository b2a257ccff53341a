//! Execution output reported by executors.

use serde::{Deserialize, Serialize};

/// Outcome classification of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStatus {
    Success,
    Failed,
}

/// Structured result returned by [`crate::Executor::execute`].
///
/// The queue classifies a task as completed only when `status` is
/// [`OutputStatus::Success`]; the payload is stored either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub status: OutputStatus,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutput {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            status: OutputStatus::Success,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: OutputStatus::Failed,
            data,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutputStatus::Success
    }
}
