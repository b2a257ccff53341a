//! Queue errors.

use thiserror::Error;

use crate::task::TaskStatus;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Status change not allowed by the task state machine.
    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Worker pool started twice.
    #[error("Worker pool is already running")]
    PoolAlreadyRunning,

    /// Engine misconfiguration or lifecycle misuse.
    #[error("Engine error: {0}")]
    Engine(String),
}
