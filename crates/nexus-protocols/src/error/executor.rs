//! Executor errors raised while running a task.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid task: {0}")]
    Validation(String),

    #[error("Timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Process exited with code {code}")]
    Process { code: i32 },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Executor initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Executor shutdown failed: {0}")]
    ShutdownFailed(String),

    #[error("Executor is not active: {0}")]
    NotActive(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
