//! Command executor implementation.

use std::any::Any;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use nexus_protocols::{
    ExecutionOutput, Executor, ExecutorContext, ExecutorError, ExecutorManifest, TaskId,
    TaskSnapshot, Version,
};

use crate::process::{ProcessHandle, ProcessTable, signal};
use crate::report::CommandReport;
use crate::request::CommandRequest;
use crate::settings::CommandSettings;

/// Registry id of the command executor.
pub const EXECUTOR_ID: &str = "command_executor";

/// Poll interval while waiting for processes to exit on shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// How long SIGKILLed processes get to disappear before shutdown gives up.
const KILL_WAIT: Duration = Duration::from_secs(1);

/// Read chunk size for output streams.
const READ_CHUNK: usize = 8192;

/// Runs OS processes described by task parameters.
pub struct CommandExecutor {
    manifest: ExecutorManifest,
    settings: RwLock<CommandSettings>,
    work_dir: Option<PathBuf>,
    processes: Arc<ProcessTable>,
    accepting: AtomicBool,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::with_manifest(Self::default_manifest())
    }

    /// Built-in manifest with the default configuration.
    pub fn default_manifest() -> ExecutorManifest {
        let defaults = serde_json::to_value(CommandSettings::default())
            .unwrap_or(serde_json::Value::Null);
        ExecutorManifest::new(EXECUTOR_ID, "Command Executor", Version::new(1, 0, 0))
            .with_description("Executes system commands and scripts")
            .with_capabilities(["command.run", "process.spawn"])
            .with_config(defaults)
    }

    pub fn with_manifest(manifest: ExecutorManifest) -> Self {
        Self {
            manifest,
            settings: RwLock::new(CommandSettings::default()),
            work_dir: None,
            processes: Arc::new(ProcessTable::new()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn settings(&self) -> CommandSettings {
        self.settings.read().clone()
    }

    /// Processes currently running on behalf of tasks.
    pub fn active_tasks(&self) -> Vec<ProcessHandle> {
        self.processes.active()
    }

    async fn run(&self, task_id: TaskId, request: CommandRequest, grace: Duration) -> CommandReport {
        let mut report = CommandReport::new(request.display());
        let started = Instant::now();

        info!(
            "Task {} running: {} (timeout {}s)",
            task_id, report.command, request.timeout_seconds
        );

        let mut child = match request.to_command().spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Task {} failed to spawn {}: {}", task_id, report.command, e);
                report.fail(
                    ExecutorError::ExecutionFailed(format!("Failed to start process: {}", e))
                        .to_string(),
                );
                report.execution_time = started.elapsed().as_secs_f64();
                report.completed_at = Utc::now();
                return report;
            }
        };

        let pid = child.id();
        let _tracked = self.processes.track(ProcessHandle {
            task_id,
            pid,
            command: report.command.clone(),
            started_at: Utc::now(),
        });

        let stdout = child.stdout.take().map(OutputReader::spawn);
        let stderr = child.stderr.take().map(OutputReader::spawn);

        match timeout(request.timeout(), child.wait()).await {
            Ok(Ok(status)) => {
                let code = exit_code(&status);
                report.exit_code = Some(code);
                if status.success() {
                    report.succeed();
                } else {
                    report.fail(ExecutorError::Process { code }.to_string());
                }
                // Anything the child left running in its group goes with it.
                if let Some(pid) = pid {
                    signal::terminate(pid);
                }
            }
            Ok(Err(e)) => {
                report.fail(
                    ExecutorError::ExecutionFailed(format!("Failed to wait for process: {}", e))
                        .to_string(),
                );
                terminate(&mut child, pid, grace).await;
            }
            Err(_) => {
                warn!(
                    "Task {} timed out after {}s, terminating {}",
                    task_id, request.timeout_seconds, report.command
                );
                terminate(&mut child, pid, grace).await;
                report.timed_out = true;
                report.fail(
                    ExecutorError::Timeout {
                        seconds: request.timeout_seconds,
                    }
                    .to_string(),
                );
            }
        }

        let deadline = tokio::time::Instant::now() + grace;
        let (out, out_closed) = OutputReader::finish(stdout, deadline).await;
        let (err, err_closed) = OutputReader::finish(stderr, deadline).await;
        if !(out_closed && err_closed) {
            if let Some(pid) = pid {
                warn!("Task {} left processes holding its output, killing group {}", task_id, pid);
                signal::kill(pid);
            }
        }
        report.stdout = out;
        report.stderr = err;
        report.execution_time = started.elapsed().as_secs_f64();
        report.completed_at = Utc::now();

        debug!(
            "Task {} finished in {:.3}s with exit code {:?}",
            task_id, report.execution_time, report.exit_code
        );
        report
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn manifest(&self) -> &ExecutorManifest {
        &self.manifest
    }

    async fn initialize(&mut self, ctx: ExecutorContext) -> Result<(), ExecutorError> {
        let settings = CommandSettings::from_config(&ctx.config)?;
        if !ctx.work_dir.is_dir() {
            return Err(ExecutorError::InitializationFailed(format!(
                "working directory {} does not exist",
                ctx.work_dir.display()
            )));
        }
        debug!("Command executor settings: {:?}", settings);
        *self.settings.write() = settings;
        self.work_dir = Some(ctx.work_dir);
        self.accepting.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ExecutorError> {
        self.accepting.store(false, Ordering::SeqCst);
        if self.processes.is_empty() {
            return Ok(());
        }

        let grace = self.settings.read().termination_grace();
        info!("Terminating {} running processes", self.processes.len());
        self.processes.terminate_all();

        let deadline = Instant::now() + grace;
        while !self.processes.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
        if self.processes.is_empty() {
            return Ok(());
        }

        self.processes.kill_all();
        let deadline = Instant::now() + KILL_WAIT;
        while !self.processes.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
        if self.processes.is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::ShutdownFailed(format!(
                "{} processes still running after SIGKILL",
                self.processes.len()
            )))
        }
    }

    fn can_execute(&self, task: &TaskSnapshot) -> bool {
        CommandRequest::accepts(task)
    }

    async fn execute(&self, task: TaskSnapshot) -> Result<ExecutionOutput, ExecutorError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ExecutorError::NotActive(self.manifest.id.clone()));
        }
        let settings = self.settings();
        let request = CommandRequest::from_task(&task, &settings, self.work_dir.as_ref())?;
        let report = self
            .run(task.id, request, settings.termination_grace())
            .await;
        Ok(report.into_output())
    }

    fn reconfigure(&self, config: &serde_json::Value) -> Result<(), ExecutorError> {
        let settings = CommandSettings::from_config(config)?;
        *self.settings.write() = settings;
        Ok(())
    }

    fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "active_tasks": self.processes.len(),
            "processes": self.processes.active(),
            "settings": self.settings(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// SIGTERM the process group, then SIGKILL it if it outlives `grace`.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    if let Some(pid) = pid {
        signal::terminate(pid);
        if timeout(grace, child.wait()).await.is_ok() {
            return;
        }
        signal::kill(pid);
    }
    if let Err(e) = child.kill().await {
        debug!("Kill after timeout failed: {}", e);
    }
}

/// Drains one output stream into a buffer shared with the caller, so output
/// read so far survives a reader that never sees EOF.
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl OutputReader {
    fn spawn<R: AsyncRead + Unpin + Send + 'static>(mut reader: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let handle = tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!("Output stream closed early: {}", e);
                        break;
                    }
                }
            }
        });
        Self { buffer, handle }
    }

    /// Wait for EOF until `deadline`. Returns the lossily decoded output and
    /// whether the stream reached EOF.
    async fn finish(reader: Option<Self>, deadline: tokio::time::Instant) -> (String, bool) {
        let Some(mut reader) = reader else {
            return (String::new(), true);
        };
        let closed = match tokio::time::timeout_at(deadline, &mut reader.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Output reader failed: {}", e);
                true
            }
            Err(_) => {
                reader.handle.abort();
                false
            }
        };
        let bytes = std::mem::take(&mut *reader.buffer.lock());
        (String::from_utf8_lossy(&bytes).into_owned(), closed)
    }
}

/// Exit code, or the negated signal number for a signalled process.
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return -sig;
        }
    }
    -1
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
