//! Task definition and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use nexus_protocols::{Parameters, TaskId, TaskSnapshot, TaskType};

use crate::error::QueueError;

/// Lowest accepted priority level.
pub const MIN_PRIORITY: u8 = 1;
/// Highest accepted priority level.
pub const MAX_PRIORITY: u8 = 10;
/// Priority used when none is given.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Priority tier a pending task waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Urgent,
    Normal,
    Batch,
}

impl PriorityTier {
    /// Tiers in dispatch order.
    pub const ALL: [PriorityTier; 3] = [Self::Urgent, Self::Normal, Self::Batch];

    /// Map a priority level to its tier: 8-10 urgent, 4-7 normal, 1-3 batch.
    ///
    /// Levels outside 1-10 are clamped first.
    pub fn from_level(level: u8) -> Self {
        match level.clamp(MIN_PRIORITY, MAX_PRIORITY) {
            8..=10 => Self::Urgent,
            4..=7 => Self::Normal,
            _ => Self::Batch,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Urgent => 0,
            Self::Normal => 1,
            Self::Batch => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Normal => "normal",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in a tier.
    #[default]
    Pending,
    /// Held by a worker.
    Running,
    Completed,
    Failed,
    /// Removed from its tier before dispatch.
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl NewTask {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            description: String::new(),
            parameters: Parameters::new(),
            priority: DEFAULT_PRIORITY,
            timeout_seconds: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// A task owned by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub description: String,
    pub parameters: Parameters,
    /// Priority level, 1-10.
    pub priority: u8,
    pub status: TaskStatus,
    pub timeout_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Executor payload, stored on completion or failure.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Id of the executor that ran the task.
    pub executor: Option<String>,
}

impl Task {
    /// Create a pending task from a submission. The priority is clamped to 1-10.
    pub fn new(new: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            task_type: new.task_type,
            description: new.description,
            parameters: new.parameters,
            priority: new.priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            status: TaskStatus::Pending,
            timeout_seconds: new.timeout_seconds,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            executor: None,
        }
    }

    pub fn tier(&self) -> PriorityTier {
        PriorityTier::from_level(self.priority)
    }

    /// Read-only copy handed to an executor.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            task_type: self.task_type,
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            priority: self.priority,
            timeout_seconds: self.timeout_seconds,
            created_at: self.created_at,
        }
    }

    /// Move to `next`, stamping start and completion times.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next == TaskStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}
