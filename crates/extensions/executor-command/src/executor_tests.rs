use super::*;
use nexus_protocols::{OutputStatus, Parameters, TaskType};
use serde_json::json;
use tempfile::TempDir;

async fn executor_with(config: serde_json::Value) -> CommandExecutor {
    let mut executor = CommandExecutor::new();
    executor
        .initialize(ExecutorContext::new(config, std::env::temp_dir()))
        .await
        .unwrap();
    executor
}

fn task(params: serde_json::Value) -> TaskSnapshot {
    let params: Parameters = match params {
        serde_json::Value::Object(map) => map,
        _ => Parameters::new(),
    };
    TaskSnapshot::new(TaskType::Generation, "command", params)
}

#[test]
fn test_default_manifest() {
    let manifest = CommandExecutor::default_manifest();
    assert_eq!(manifest.id, EXECUTOR_ID);
    assert_eq!(manifest.kind, "executors");
    assert!(manifest.has_capability("command.run"));
    assert_eq!(manifest.config["default_timeout_seconds"], 300);
}

#[tokio::test]
async fn test_initialize_rejects_bad_config() {
    let mut executor = CommandExecutor::new();
    let err = executor
        .initialize(ExecutorContext::new(
            json!({"default_timeout_seconds": 0}),
            std::env::temp_dir(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_can_execute() {
    let executor = executor_with(json!({})).await;
    assert!(executor.can_execute(&task(json!({"command": "echo"}))));
    assert!(!executor.can_execute(&task(json!({"script": "echo"}))));
}

#[tokio::test]
async fn test_validation_error_is_err() {
    let executor = executor_with(json!({})).await;
    let err = executor
        .execute(task(json!({"command": "echo", "timeout_seconds": 0})))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Validation(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_echo() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({"command": "echo", "args": ["hello"]})))
        .await
        .unwrap();

    assert_eq!(output.status, OutputStatus::Success);
    assert_eq!(output.data["stdout"].as_str().unwrap().trim(), "hello");
    assert_eq!(output.data["exit_code"], 0);
    assert_eq!(output.data["timed_out"], false);
    assert_eq!(output.data["command"], "echo hello");
    assert!(output.data["execution_time"].as_f64().unwrap() >= 0.0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_nonzero_exit() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({"command": ["sh", "-c", "echo oops >&2; exit 3"]})))
        .await
        .unwrap();

    assert!(!output.is_success());
    assert_eq!(output.data["exit_code"], 3);
    assert_eq!(output.data["stderr"].as_str().unwrap().trim(), "oops");
    assert_eq!(output.error.as_deref(), Some("Process exited with code 3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_program_is_failed_output() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({"command": "definitely-not-a-real-program-xyz"})))
        .await
        .unwrap();

    assert!(!output.is_success());
    assert!(output.error.unwrap().contains("Failed to start process"));
    assert!(output.data.get("exit_code").is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_process() {
    let executor = executor_with(json!({"termination_grace_seconds": 1})).await;
    let started = Instant::now();
    let output = executor
        .execute(task(json!({"command": "sleep 5", "timeout_seconds": 1})))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!output.is_success());
    assert_eq!(output.data["timed_out"], true);
    assert!(output.data.get("exit_code").is_none());
    assert_eq!(output.error.as_deref(), Some("Timed out after 1 seconds"));
    assert!(executor.active_tasks().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_process_group() {
    let executor = executor_with(json!({"termination_grace_seconds": 1})).await;
    let started = Instant::now();
    let output = executor
        .execute(task(json!({
            "command": "sleep 5 & sleep 5; wait",
            "shell": true,
            "timeout_seconds": 1
        })))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(output.data["timed_out"], true);
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_child_keeps_output() {
    let executor = executor_with(json!({"termination_grace_seconds": 1})).await;
    let started = Instant::now();
    let output = executor
        .execute(task(json!({"command": "echo hi; sleep 3 &", "shell": true})))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(2500));
    assert!(output.is_success());
    assert_eq!(output.data["stdout"], "hi\n");
    assert_eq!(output.data["exit_code"], 0);
    assert!(executor.active_tasks().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_child_ignoring_term_is_killed() {
    let executor = executor_with(json!({"termination_grace_seconds": 1})).await;
    let started = Instant::now();
    let output = executor
        .execute(task(json!({
            "command": "echo hi; (trap '' TERM; sleep 5) &",
            "shell": true
        })))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(output.is_success());
    assert_eq!(output.data["stdout"], "hi\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_environment_overlay() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({
            "command": "echo $NEXUS_TEST_VAR",
            "shell": true,
            "environment": {"NEXUS_TEST_VAR": "from-task"}
        })))
        .await
        .unwrap();

    assert!(output.is_success());
    assert_eq!(output.data["stdout"].as_str().unwrap().trim(), "from-task");
}

#[cfg(unix)]
#[tokio::test]
async fn test_working_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({
            "command": "ls",
            "working_directory": dir.path().to_str().unwrap()
        })))
        .await
        .unwrap();

    assert!(output.is_success());
    assert!(output.data["stdout"].as_str().unwrap().contains("marker.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_mode_pipeline() {
    let executor = executor_with(json!({"shell": true})).await;
    let output = executor
        .execute(task(json!({"command": "printf 'a\\nb\\nc\\n' | wc -l"})))
        .await
        .unwrap();

    assert!(output.is_success());
    assert_eq!(output.data["stdout"].as_str().unwrap().trim(), "3");
}

#[cfg(unix)]
#[tokio::test]
async fn test_capture_disabled() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({"command": "echo hidden", "capture_output": false})))
        .await
        .unwrap();

    assert!(output.is_success());
    assert_eq!(output.data["stdout"], "");
    assert_eq!(output.data["stderr"], "");
}

#[cfg(unix)]
#[tokio::test]
async fn test_lossy_output_decoding() {
    let executor = executor_with(json!({})).await;
    let output = executor
        .execute(task(json!({"command": "printf '\\377ok'", "shell": true})))
        .await
        .unwrap();

    assert!(output.is_success());
    assert!(output.data["stdout"].as_str().unwrap().ends_with("ok"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_active_tasks_tracked_while_running() {
    let executor = Arc::new(executor_with(json!({})).await);
    let running = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor
                .execute(task(json!({"command": "sleep 1"})))
                .await
                .unwrap()
        })
    };

    let mut seen = false;
    for _ in 0..100 {
        if executor.active_tasks().len() == 1 {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(seen);
    assert_eq!(executor.status()["active_tasks"], 1);

    let output = running.await.unwrap();
    assert!(output.is_success());
    assert!(executor.active_tasks().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_terminates_running_processes() {
    let executor = Arc::new(executor_with(json!({"termination_grace_seconds": 2})).await);
    let running = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor
                .execute(task(json!({"command": "sleep 30"})))
                .await
                .unwrap()
        })
    };
    while executor.active_tasks().is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    executor.shutdown().await.unwrap();
    let output = running.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!output.is_success());
    assert_eq!(output.data["exit_code"], -15);
}

#[tokio::test]
async fn test_reconfigure() {
    let executor = executor_with(json!({})).await;
    executor
        .reconfigure(&json!({"default_timeout_seconds": 10, "max_timeout_seconds": 20}))
        .unwrap();
    assert_eq!(executor.settings().default_timeout_seconds, 10);

    assert!(executor
        .reconfigure(&json!({"default_timeout_seconds": 30, "max_timeout_seconds": 20}))
        .is_err());
    assert_eq!(executor.settings().max_timeout_seconds, 20);
}

#[tokio::test]
async fn test_initialize_rejects_missing_work_dir() {
    let dir = TempDir::new().unwrap();
    let mut executor = CommandExecutor::new();
    let err = executor
        .initialize(ExecutorContext::new(json!({}), dir.path().join("absent")))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InitializationFailed(_)));
}

#[tokio::test]
async fn test_execute_after_shutdown_is_refused() {
    let executor = executor_with(json!({})).await;
    executor.shutdown().await.unwrap();

    let err = executor
        .execute(task(json!({"command": "echo late"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::NotActive(_)));
}
