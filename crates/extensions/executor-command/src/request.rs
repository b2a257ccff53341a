//! Translating task parameters into a process invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use nexus_protocols::{ExecutorError, TaskSnapshot};

use crate::settings::CommandSettings;

/// A fully resolved command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Program and arguments. In shell mode a single script string.
    pub argv: Vec<String>,
    pub shell: bool,
    pub timeout_seconds: u64,
    pub working_directory: Option<PathBuf>,
    /// Variables overlaid on the inherited environment.
    pub environment: BTreeMap<String, String>,
    pub capture_output: bool,
}

impl CommandRequest {
    /// True when the task carries a non-empty `command`.
    pub fn accepts(task: &TaskSnapshot) -> bool {
        match task.parameters.get("command") {
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(serde_json::Value::Array(items)) => items
                .first()
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.trim().is_empty()),
            _ => false,
        }
    }

    /// Resolve a request from task parameters and executor settings.
    ///
    /// `command` may be a string or an array; `args` are appended. The
    /// timeout is `timeout_seconds`, else the task timeout, else the
    /// configured default, always capped at the configured maximum.
    pub fn from_task(
        task: &TaskSnapshot,
        settings: &CommandSettings,
        default_dir: Option<&PathBuf>,
    ) -> Result<Self, ExecutorError> {
        let shell = task.parameter::<bool>("shell").unwrap_or(settings.shell);
        let capture_output = task
            .parameter::<bool>("capture_output")
            .unwrap_or(settings.capture_output);

        let command = task
            .parameters
            .get("command")
            .ok_or_else(|| ExecutorError::Validation("No command provided".to_string()))?;
        let args = match task.parameters.get("args") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| scalar_to_string(v, "args"))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => vec![scalar_to_string(other, "args")?],
        };

        let argv = if shell {
            vec![shell_script(command, &args)?]
        } else {
            let mut argv = split_command(command)?;
            argv.extend(args);
            argv
        };
        if argv.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ExecutorError::Validation("No command provided".to_string()));
        }

        let requested = match task.parameters.get("timeout_seconds") {
            None | Some(serde_json::Value::Null) => task.timeout_seconds,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                ExecutorError::Validation("timeout_seconds must be a positive integer".to_string())
            })?),
        };
        if requested == Some(0) {
            return Err(ExecutorError::Validation(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let working_directory = task
            .parameter::<String>("working_directory")
            .or_else(|| task.parameter::<String>("cwd"))
            .map(PathBuf::from)
            .or_else(|| default_dir.cloned());

        let environment = match task.parameters.get("environment") {
            None | Some(serde_json::Value::Null) => BTreeMap::new(),
            Some(serde_json::Value::Object(vars)) => vars
                .iter()
                .map(|(k, v)| Ok((k.clone(), scalar_to_string(v, "environment")?)))
                .collect::<Result<BTreeMap<_, _>, ExecutorError>>()?,
            Some(_) => {
                return Err(ExecutorError::Validation(
                    "environment must be an object".to_string(),
                ));
            }
        };

        Ok(Self {
            argv,
            shell,
            timeout_seconds: settings.resolve_timeout(requested),
            working_directory,
            environment,
            capture_output,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Human-readable command line for logs and reports.
    pub fn display(&self) -> String {
        if self.shell {
            return self.argv.join(" ");
        }
        shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "))
    }

    /// Build the process. The child gets its own process group so a
    /// timeout can signal everything it spawned.
    pub fn to_command(&self) -> Command {
        let mut cmd = if self.shell {
            let (shell, flag) = if cfg!(target_os = "windows") {
                ("cmd", "/C")
            } else {
                ("sh", "-c")
            };
            let mut cmd = Command::new(shell);
            cmd.arg(flag).args(&self.argv);
            cmd
        } else {
            let (program, args) = match self.argv.split_first() {
                Some((program, args)) => (program.as_str(), args),
                None => ("", &[][..]),
            };
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        };

        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.environment);

        let (stdout, stderr) = if self.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };
        cmd.stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

fn scalar_to_string(value: &serde_json::Value, field: &str) -> Result<String, ExecutorError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ExecutorError::Validation(format!(
            "{} values must be strings, numbers or booleans",
            field
        ))),
    }
}

/// Argument vector for direct execution. Strings are split shell-style.
fn split_command(command: &serde_json::Value) -> Result<Vec<String>, ExecutorError> {
    match command {
        serde_json::Value::String(s) => shlex::split(s)
            .ok_or_else(|| ExecutorError::Validation(format!("Unbalanced quoting in command: {}", s))),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| scalar_to_string(v, "command"))
            .collect(),
        _ => Err(ExecutorError::Validation(
            "command must be a string or an array".to_string(),
        )),
    }
}

/// Script for `sh -c`. A string command is used verbatim; arguments and
/// array elements are quoted.
fn shell_script(command: &serde_json::Value, args: &[String]) -> Result<String, ExecutorError> {
    let mut script = match command {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(_) => quote_all(&split_command(command)?)?,
        _ => {
            return Err(ExecutorError::Validation(
                "command must be a string or an array".to_string(),
            ));
        }
    };
    if !args.is_empty() {
        script.push(' ');
        script.push_str(&quote_all(args)?);
    }
    Ok(script)
}

fn quote_all(words: &[String]) -> Result<String, ExecutorError> {
    shlex::try_join(words.iter().map(String::as_str))
        .map_err(|e| ExecutorError::Validation(e.to_string()))
}
