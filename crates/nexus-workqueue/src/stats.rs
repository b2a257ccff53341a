//! Engine statistics snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use nexus_core::RegistryStats;

/// Pending tasks per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierDepths {
    pub urgent: usize,
    pub normal: usize,
    pub batch: usize,
}

impl TierDepths {
    pub fn total(&self) -> usize {
        self.urgent + self.normal + self.batch
    }
}

/// Tasks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Cumulative counters since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueTotals {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

/// Cumulative outcomes attributed to one executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorCounters {
    pub completed: u64,
    pub failed: u64,
}

/// Worker utilisation. A worker is active while it holds a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
}

/// Everything the engine reports about itself.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub queue: TierDepths,
    pub tasks: StatusCounts,
    pub workers: WorkerStats,
    pub totals: QueueTotals,
    pub by_executor: BTreeMap<String, ExecutorCounters>,
    pub registry: RegistryStats,
}
