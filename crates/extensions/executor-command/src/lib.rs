//! Command executor for Nexus.
//!
//! Runs external processes for tasks that carry a `command` parameter:
//! - argument vectors or `sh -c` strings
//! - per-task timeout with SIGTERM then SIGKILL escalation
//! - environment overlay and working directory override
//! - lenient stdout/stderr capture

mod executor;
mod process;
mod report;
mod request;
mod settings;

pub use executor::{CommandExecutor, EXECUTOR_ID};
pub use process::{ProcessHandle, ProcessTable};
pub use report::CommandReport;
pub use request::CommandRequest;
pub use settings::CommandSettings;

use nexus_core::ExecutorFactories;
use nexus_protocols::Executor;

/// Register the command executor factory.
pub fn register(factories: &ExecutorFactories) {
    factories.register(EXECUTOR_ID, |manifest| {
        Box::new(CommandExecutor::with_manifest(manifest)) as Box<dyn Executor>
    });
}
