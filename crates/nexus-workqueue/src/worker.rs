//! Worker pool for task execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nexus_core::ExecutorRegistry;
use nexus_protocols::{TaskId, TaskSnapshot};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::PriorityTaskQueue;
use crate::stats::WorkerStats;
use crate::task::TaskStatus;

/// Error recorded when no active executor accepts a task.
pub const NO_EXECUTOR_ERROR: &str = "No executor available for task";

/// A single worker.
pub struct Worker {
    id: usize,
    running: AtomicBool,
    current_task: Mutex<Option<TaskId>>,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
}

impl Worker {
    /// Create a new worker.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            running: AtomicBool::new(false),
            current_task: Mutex::new(None),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
        }
    }

    /// Get worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Check if the worker loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Task currently held by this worker.
    pub fn current_task(&self) -> Option<TaskId> {
        *self.current_task.lock()
    }

    /// Get completed task count.
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::SeqCst)
    }

    /// Get failed task count.
    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::SeqCst)
    }

    /// Poll the queue until `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        queue: Arc<PriorityTaskQueue>,
        registry: Arc<ExecutorRegistry>,
        idle_backoff: Duration,
        cancel: CancellationToken,
    ) {
        self.running.store(true, Ordering::SeqCst);
        debug!("Worker {} started", self.id);

        while !cancel.is_cancelled() {
            match queue.claim_next() {
                Some(task) => self.process(task, &queue, &registry).await,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(idle_backoff) => {}
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Worker {} stopped", self.id);
    }

    /// Run one claimed task to a terminal state.
    ///
    /// Executor errors and panics become a failed task; nothing escapes.
    pub async fn process(
        &self,
        task: TaskSnapshot,
        queue: &PriorityTaskQueue,
        registry: &ExecutorRegistry,
    ) {
        let id = task.id;
        *self.current_task.lock() = Some(id);

        let recorded = match registry.find_capable(&task) {
            None => {
                warn!("Worker {}: no executor available for task {}", self.id, id);
                queue.fail(&id, None, NO_EXECUTOR_ERROR)
            }
            Some(executor) => {
                let executor_id = executor.manifest().id.clone();
                debug!("Worker {} dispatching task {} to {}", self.id, id, executor_id);

                // Run on its own task so a panicking executor cannot take the worker down.
                let handle = tokio::spawn(async move { executor.execute(task).await });
                match handle.await {
                    Ok(Ok(output)) => queue.complete(&id, &executor_id, output),
                    Ok(Err(e)) => queue.fail(&id, Some(&executor_id), e.to_string()),
                    Err(e) => {
                        error!("Executor {} aborted on task {}: {}", executor_id, id, e);
                        queue.fail(&id, Some(&executor_id), format!("Executor aborted: {}", e))
                    }
                }
            }
        };

        match recorded {
            Ok(TaskStatus::Completed) => {
                self.tasks_completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(_) => {
                self.tasks_failed.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => error!("Worker {} could not record task {}: {}", self.id, id, e),
        }

        *self.current_task.lock() = None;
    }
}

/// Fixed-size pool of workers started and stopped together.
pub struct WorkerPool {
    config: QueueConfig,
    queue: Arc<PriorityTaskQueue>,
    registry: Arc<ExecutorRegistry>,
    workers: Mutex<Vec<(Arc<Worker>, JoinHandle<()>)>>,
    cancel: Mutex<CancellationToken>,
    running: AtomicBool,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(
        config: QueueConfig,
        queue: Arc<PriorityTaskQueue>,
        registry: Arc<ExecutorRegistry>,
    ) -> Self {
        Self {
            config,
            queue,
            registry,
            workers: Mutex::new(Vec::new()),
            cancel: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Spawn the configured number of workers. Must run inside a tokio runtime.
    pub fn start(&self) -> Result<(), QueueError> {
        if self.config.workers == 0 {
            return Err(QueueError::Engine(
                "worker count must be greater than 0".to_string(),
            ));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::PoolAlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();

        let mut workers = self.workers.lock();
        for id in 0..self.config.workers {
            let worker = Arc::new(Worker::new(id));
            let handle = tokio::spawn(worker.clone().run(
                self.queue.clone(),
                self.registry.clone(),
                self.config.idle_backoff(),
                token.clone(),
            ));
            workers.push((worker, handle));
        }

        info!("Worker pool started with {} workers", self.config.workers);
        Ok(())
    }

    /// Stop all workers, waiting at most `grace` for busy ones.
    ///
    /// Idle workers exit immediately. Busy workers finish their current
    /// task; any still running after `grace` are aborted and the task they
    /// held is marked failed.
    pub async fn stop(&self, grace: Duration) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping worker pool...");
        self.cancel.lock().cancel();

        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0usize;

        for (worker, mut handle) in workers {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker {} terminated abnormally: {}", worker.id(), e),
                Err(_) => {
                    handle.abort();
                    if let Err(e) = handle.await {
                        debug!("Worker {} aborted: {}", worker.id(), e);
                    }
                    aborted += 1;
                    if let Some(task) = worker.current_task() {
                        if let Err(e) =
                            self.queue
                                .fail(&task, None, "Worker stopped before task finished")
                        {
                            debug!("Task {} already settled: {}", task, e);
                        }
                    }
                }
            }
        }

        if aborted > 0 {
            warn!("Aborted {} workers after {:?} grace period", aborted, grace);
        }
        info!("Worker pool stopped");
    }

    /// Check if pool is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Worker counts; a worker is active while it holds a task.
    pub fn worker_stats(&self) -> WorkerStats {
        let workers = self.workers.lock();
        let total = workers.len();
        let active = workers
            .iter()
            .filter(|(w, _)| w.current_task().is_some())
            .count();
        WorkerStats {
            total,
            active,
            idle: total - active,
        }
    }

    /// The pool's workers.
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.workers.lock().iter().map(|(w, _)| w.clone()).collect()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
