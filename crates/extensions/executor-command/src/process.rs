//! Tracking of live child processes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use nexus_protocols::TaskId;

/// A process started for a task.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessHandle {
    pub task_id: TaskId,
    /// OS process id, also the process group id of the child.
    pub pid: Option<u32>,
    pub command: String,
    pub started_at: DateTime<Utc>,
}

/// Live processes keyed by task id.
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: DashMap<TaskId, ProcessHandle>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a process. The entry is removed when the returned guard drops.
    pub fn track(self: &Arc<Self>, handle: ProcessHandle) -> TrackedProcess {
        let task_id = handle.task_id;
        debug!("Tracking process {:?} for task {}", handle.pid, task_id);
        self.processes.insert(task_id, handle);
        TrackedProcess {
            table: self.clone(),
            task_id,
        }
    }

    pub fn get(&self, task_id: &TaskId) -> Option<ProcessHandle> {
        self.processes.get(task_id).map(|h| h.clone())
    }

    /// Snapshot of all live processes.
    pub fn active(&self) -> Vec<ProcessHandle> {
        let mut handles: Vec<ProcessHandle> =
            self.processes.iter().map(|h| h.value().clone()).collect();
        handles.sort_by_key(|h| h.started_at);
        handles
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Ask every tracked process group to exit.
    pub fn terminate_all(&self) {
        for handle in self.processes.iter() {
            if let Some(pid) = handle.pid {
                signal::terminate(pid);
            }
        }
    }

    /// Force-kill every tracked process group.
    pub fn kill_all(&self) {
        for handle in self.processes.iter() {
            if let Some(pid) = handle.pid {
                warn!("Killing process {} for task {}", pid, handle.task_id);
                signal::kill(pid);
            }
        }
    }
}

/// Guard removing a process from its table on drop.
#[derive(Debug)]
pub struct TrackedProcess {
    table: Arc<ProcessTable>,
    task_id: TaskId,
}

impl Drop for TrackedProcess {
    fn drop(&mut self) {
        self.table.processes.remove(&self.task_id);
    }
}

/// Process group signalling.
pub(crate) mod signal {
    #[cfg(unix)]
    fn send(pid: u32, sig: nix::sys::signal::Signal) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        // ESRCH just means the group is already gone.
        if let Err(e) = killpg(Pid::from_raw(raw), sig) {
            if e != nix::errno::Errno::ESRCH {
                tracing::warn!("Failed to send {} to process group {}: {}", sig.as_str(), pid, e);
            }
        }
    }

    /// Send SIGTERM to the process group led by `pid`.
    pub fn terminate(pid: u32) {
        #[cfg(unix)]
        send(pid, nix::sys::signal::Signal::SIGTERM);
        #[cfg(not(unix))]
        tracing::debug!("Graceful termination not supported for process {}", pid);
    }

    /// Send SIGKILL to the process group led by `pid`.
    pub fn kill(pid: u32) {
        #[cfg(unix)]
        send(pid, nix::sys::signal::Signal::SIGKILL);
        #[cfg(not(unix))]
        tracing::debug!("Group kill not supported for process {}", pid);
    }
}
