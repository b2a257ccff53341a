//! One-shot command execution.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use nexus_config::Config;
use nexus_protocols::TaskType;
use nexus_workqueue::{NewTask, TaskStatus};

use crate::bootstrap;

/// Slack on top of the task timeout before giving up on a result.
const WAIT_SLACK: Duration = Duration::from_secs(30);

/// Fallback wait when no task timeout is given.
const DEFAULT_WAIT: Duration = Duration::from_secs(3600);

pub(crate) struct ExecRequest {
    pub priority: u8,
    pub timeout: Option<u64>,
    pub shell: bool,
    pub command: Vec<String>,
}

impl ExecRequest {
    fn into_task(self) -> NewTask {
        let description = self.command.join(" ");
        let command = if self.shell {
            serde_json::json!(description)
        } else {
            serde_json::json!(self.command)
        };

        let mut task = NewTask::new(TaskType::Generation)
            .with_description(description)
            .with_priority(self.priority)
            .with_parameter("command", command)
            .with_parameter("shell", serde_json::json!(self.shell));
        if let Some(timeout) = self.timeout {
            task = task.with_timeout(timeout);
        }
        task
    }
}

/// Submit one command task, wait for it and print it. Returns whether it completed.
pub(crate) async fn exec(
    config: &Config,
    work_dir: &Path,
    request: ExecRequest,
) -> Result<bool, Box<dyn std::error::Error>> {
    let wait = request
        .timeout
        .map(|t| Duration::from_secs(t) + WAIT_SLACK)
        .unwrap_or(DEFAULT_WAIT);

    let engine = bootstrap::build_engine(config, work_dir);
    engine.start().await?;

    let id = engine.submit(request.into_task());
    let task = engine.wait_for_terminal(&id, wait).await;
    engine.shutdown().await;

    let Some(task) = task else {
        return Err(format!("Task {} disappeared", id).into());
    };
    if !task.status.is_terminal() {
        warn!("Task {} still {} after {:?}", id, task.status, wait);
    }

    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(task.status == TaskStatus::Completed)
}
