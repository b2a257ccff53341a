//! Execution engine facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use nexus_core::{AvailableExecutor, ExecutorRegistry, ExecutorStatus};
use nexus_protocols::TaskId;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::PriorityTaskQueue;
use crate::stats::EngineStatistics;
use crate::task::{NewTask, Task, TaskStatus};
use crate::worker::WorkerPool;

/// Poll interval used by [`ExecutionEngine::wait_for_terminal`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Caller-owned engine tying a queue, a worker pool and an executor registry
/// together behind one lifecycle.
pub struct ExecutionEngine {
    config: QueueConfig,
    queue: Arc<PriorityTaskQueue>,
    registry: Arc<ExecutorRegistry>,
    pool: WorkerPool,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl ExecutionEngine {
    pub fn new(config: QueueConfig, registry: Arc<ExecutorRegistry>) -> Self {
        let queue = Arc::new(PriorityTaskQueue::new());
        let pool = WorkerPool::new(config.clone(), queue.clone(), registry.clone());
        Self {
            config,
            queue,
            registry,
            pool,
            started_at: Mutex::new(None),
        }
    }

    /// Scan manifests, bring up the default executors and start the workers.
    ///
    /// A default executor that fails to load is logged and skipped.
    pub async fn start(&self) -> Result<(), QueueError> {
        if self.pool.is_running() {
            return Err(QueueError::PoolAlreadyRunning);
        }

        info!("Starting execution engine...");
        self.registry.scan();

        for id in &self.config.default_executors {
            if self.load_executor(id).await {
                self.registry.activate(id).await;
            }
        }

        self.pool.start()?;
        *self.started_at.lock() = Some(Utc::now());
        info!("Execution engine started");
        Ok(())
    }

    /// Stop the workers. In-flight processes are left to their executors.
    pub async fn stop(&self) {
        self.pool.stop(self.config.shutdown_grace()).await;
        *self.started_at.lock() = None;
        info!("Execution engine stopped");
    }

    /// Stop the workers, then unload every executor so tracked processes
    /// are terminated.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.registry.shutdown_all().await;
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Enqueue a task. Always succeeds.
    pub fn submit(&self, task: NewTask) -> TaskId {
        self.queue.submit(task)
    }

    /// Cancel a task still waiting in its tier.
    pub fn cancel(&self, id: &TaskId) -> bool {
        self.queue.cancel(id)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.queue.get(id)
    }

    /// Tasks newest first.
    pub fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        self.queue.list(status, limit)
    }

    pub fn statistics(&self) -> EngineStatistics {
        EngineStatistics {
            running: self.is_running(),
            started_at: *self.started_at.lock(),
            queue: self.queue.depths(),
            tasks: self.queue.status_counts(),
            workers: self.pool.worker_stats(),
            totals: self.queue.totals(),
            by_executor: self.queue.executor_counters(),
            registry: self.registry.stats(),
        }
    }

    /// Load an executor and its dependencies. Failures are logged.
    pub async fn load_executor(&self, id: &str) -> bool {
        match self.registry.load(id).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to load executor {}: {}", id, e);
                false
            }
        }
    }

    pub async fn unload_executor(&self, id: &str, force: bool) -> bool {
        self.registry.unload(id, force).await
    }

    pub async fn activate_executor(&self, id: &str) -> bool {
        self.registry.activate(id).await
    }

    pub async fn deactivate_executor(&self, id: &str) -> bool {
        self.registry.deactivate(id).await
    }

    pub fn list_available(&self) -> Vec<AvailableExecutor> {
        self.registry.list_available()
    }

    pub fn list_loaded(&self) -> Vec<ExecutorStatus> {
        self.registry.list_loaded(None)
    }

    /// Poll until the task reaches a terminal state or `timeout` elapses.
    ///
    /// Returns the last seen task, terminal or not; `None` for unknown ids.
    pub async fn wait_for_terminal(&self, id: &TaskId, timeout: Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.queue.get(id)?;
            if task.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Some(task);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<PriorityTaskQueue> {
        &self.queue
    }
}
