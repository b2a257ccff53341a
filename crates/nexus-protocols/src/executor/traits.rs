//! Executor trait definitions.

use async_trait::async_trait;
use std::any::Any;

use super::{ExecutionOutput, ExecutorContext, ExecutorManifest, TaskSnapshot};
use crate::error::ExecutorError;

/// Core trait for all executors.
///
/// `execute` may run concurrently on several workers, so implementations
/// keep mutable state behind interior locks.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Get the executor manifest.
    fn manifest(&self) -> &ExecutorManifest;

    /// Initialize the executor with its effective configuration.
    async fn initialize(&mut self, ctx: ExecutorContext) -> Result<(), ExecutorError>;

    /// Release resources before unload.
    async fn shutdown(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Decide whether this executor can handle the task.
    fn can_execute(&self, task: &TaskSnapshot) -> bool;

    /// Execute the task and report a structured outcome.
    async fn execute(&self, task: TaskSnapshot) -> Result<ExecutionOutput, ExecutorError>;

    /// Apply a configuration update while loaded.
    fn reconfigure(&self, _config: &serde_json::Value) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Executor-specific status information.
    fn status(&self) -> serde_json::Value {
        serde_json::Value::Object(serde_json::Map::new())
    }

    /// Get as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}
