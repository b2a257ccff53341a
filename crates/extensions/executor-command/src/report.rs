//! Command execution report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nexus_protocols::{ExecutionOutput, OutputStatus};

/// Outcome of one command run, stored as the task result.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub status: OutputStatus,
    pub success: bool,
    /// Absent when the process was killed on timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall time in seconds.
    pub execution_time: f64,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub command: String,
    pub completed_at: DateTime<Utc>,
}

impl CommandReport {
    pub(crate) fn new(command: String) -> Self {
        Self {
            status: OutputStatus::Failed,
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            execution_time: 0.0,
            timed_out: false,
            error: None,
            command,
            completed_at: Utc::now(),
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.status = OutputStatus::Success;
        self.success = true;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = OutputStatus::Failed;
        self.success = false;
        self.error = Some(error.into());
    }

    pub fn into_output(self) -> ExecutionOutput {
        let data = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        match (self.success, self.error) {
            (true, _) => ExecutionOutput::success(data),
            (false, Some(error)) => ExecutionOutput::failed(error, data),
            (false, None) => ExecutionOutput::failed("Command failed", data),
        }
    }
}
