//! Three-tier priority queue.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::{debug, info};

use nexus_protocols::{ExecutionOutput, TaskId, TaskSnapshot};

use crate::error::QueueError;
use crate::stats::{ExecutorCounters, QueueTotals, StatusCounts, TierDepths};
use crate::task::{NewTask, PriorityTier, Task, TaskStatus};

#[derive(Default)]
struct QueueState {
    /// Pending ids, indexed by `PriorityTier::index`.
    tiers: [VecDeque<TaskId>; 3],
    tasks: HashMap<TaskId, Task>,
    totals: QueueTotals,
    by_executor: HashMap<String, ExecutorCounters>,
}

impl QueueState {
    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, QueueError> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))
    }

    fn pop_next(&mut self) -> Option<TaskId> {
        self.tiers.iter_mut().find_map(|tier| tier.pop_front())
    }
}

/// Priority-tiered task queue.
///
/// Urgent drains before normal, normal before batch; FIFO within a tier.
/// Every read and write goes through one mutex, so a task id can never be
/// dequeued twice and statistics are always a consistent snapshot.
pub struct PriorityTaskQueue {
    state: Mutex<QueueState>,
}

impl PriorityTaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Store a task and append it to the tail of its tier.
    pub fn submit(&self, new: NewTask) -> TaskId {
        let task = Task::new(new);
        let id = task.id;
        let tier = task.tier();

        let mut state = self.state.lock();
        state.tiers[tier.index()].push_back(id);
        state.tasks.insert(id, task);
        state.totals.submitted += 1;

        info!("Task submitted: {} (tier: {})", id, tier);
        id
    }

    /// Pop the head of the first non-empty tier. The task stays pending.
    pub fn next_task(&self) -> Option<TaskId> {
        self.state.lock().pop_next()
    }

    /// Move a dequeued task to running and snapshot it.
    pub fn mark_running(&self, id: &TaskId) -> Result<TaskSnapshot, QueueError> {
        let mut state = self.state.lock();
        let task = state.task_mut(id)?;
        task.transition(TaskStatus::Running)?;
        Ok(task.snapshot())
    }

    /// Dequeue and mark running in a single critical section.
    pub fn claim_next(&self) -> Option<TaskSnapshot> {
        let mut state = self.state.lock();
        while let Some(id) = state.pop_next() {
            if let Ok(task) = state.task_mut(&id) {
                if task.transition(TaskStatus::Running).is_ok() {
                    debug!("Task claimed: {}", id);
                    return Some(task.snapshot());
                }
            }
            debug!("Skipping stale queue entry: {}", id);
        }
        None
    }

    /// Record an executor's report. The task completes only when the
    /// report status is success; otherwise it fails with the report error.
    pub fn complete(
        &self,
        id: &TaskId,
        executor: &str,
        output: ExecutionOutput,
    ) -> Result<TaskStatus, QueueError> {
        let mut state = self.state.lock();
        let success = output.is_success();
        let next = if success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        let task = state.task_mut(id)?;
        task.transition(next)?;
        task.executor = Some(executor.to_string());
        task.error = if success {
            None
        } else {
            Some(
                output
                    .error
                    .unwrap_or_else(|| "Executor reported failure".to_string()),
            )
        };
        task.result = Some(output.data);

        let counters = state.by_executor.entry(executor.to_string()).or_default();
        if success {
            counters.completed += 1;
            state.totals.completed += 1;
            info!("Task completed: {} (executor: {})", id, executor);
        } else {
            counters.failed += 1;
            state.totals.failed += 1;
            info!("Task failed: {} (executor: {})", id, executor);
        }

        Ok(next)
    }

    /// Fail a running task. `executor` is `None` when no executor was chosen.
    pub fn fail(
        &self,
        id: &TaskId,
        executor: Option<&str>,
        error: impl Into<String>,
    ) -> Result<TaskStatus, QueueError> {
        let error = error.into();
        let mut state = self.state.lock();

        let task = state.task_mut(id)?;
        task.transition(TaskStatus::Failed)?;
        task.executor = executor.map(str::to_string);
        info!("Task failed: {}: {}", id, error);
        task.error = Some(error);

        if let Some(executor) = executor {
            state
                .by_executor
                .entry(executor.to_string())
                .or_default()
                .failed += 1;
        }
        state.totals.failed += 1;

        Ok(TaskStatus::Failed)
    }

    /// Cancel a task that is still waiting in its tier.
    ///
    /// Returns `false` once the task has been dequeued, or for unknown ids.
    pub fn cancel(&self, id: &TaskId) -> bool {
        let mut state = self.state.lock();

        let tier = match state.tasks.get(id) {
            Some(task) if task.status == TaskStatus::Pending => task.tier(),
            _ => return false,
        };

        let queue = &mut state.tiers[tier.index()];
        let Some(pos) = queue.iter().position(|queued| queued == id) else {
            return false;
        };
        queue.remove(pos);

        let cancelled = state
            .tasks
            .get_mut(id)
            .is_some_and(|task| task.transition(TaskStatus::Cancelled).is_ok());
        if cancelled {
            state.totals.cancelled += 1;
            info!("Task cancelled: {}", id);
        }
        cancelled
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.state.lock().tasks.get(id).cloned()
    }

    /// Tasks newest first, optionally filtered by status.
    pub fn list(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        let state = self.state.lock();
        let mut tasks: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks.into_iter().take(limit).cloned().collect()
    }

    pub fn depths(&self) -> TierDepths {
        let state = self.state.lock();
        TierDepths {
            urgent: state.tiers[PriorityTier::Urgent.index()].len(),
            normal: state.tiers[PriorityTier::Normal.index()].len(),
            batch: state.tiers[PriorityTier::Batch.index()].len(),
        }
    }

    pub fn status_counts(&self) -> StatusCounts {
        let state = self.state.lock();
        let mut counts = StatusCounts::default();
        for task in state.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn totals(&self) -> QueueTotals {
        self.state.lock().totals
    }

    pub fn executor_counters(&self) -> BTreeMap<String, ExecutorCounters> {
        self.state
            .lock()
            .by_executor
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Number of pending tasks across all tiers.
    pub fn len(&self) -> usize {
        self.state.lock().tiers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriorityTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
