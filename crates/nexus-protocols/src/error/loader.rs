//! Registry lifecycle errors.

use thiserror::Error;

use super::ExecutorError;

/// Failure to resolve or honour the dependency graph between executors.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Executor dependency not satisfied: {executor} requires {dependency}: {reason}")]
    Unsatisfied {
        executor: String,
        dependency: String,
        reason: String,
    },

    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Cannot unload {executor}: required by {}", .dependents.join(", "))]
    HasDependents {
        executor: String,
        dependents: Vec<String>,
    },
}

/// Failure to load, instantiate, or unload an executor.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Executor not found: {0}")]
    NotFound(String),

    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: String, message: String },

    #[error("No factory registered for executor: {0}")]
    FactoryMissing(String),

    #[error("Executor initialization failed: {id}: {source}")]
    InitializationFailed {
        id: String,
        #[source]
        source: ExecutorError,
    },

    #[error("Executor shutdown failed: {id}: {source}")]
    ShutdownFailed {
        id: String,
        #[source]
        source: ExecutorError,
    },

    #[error("Executor rejected configuration: {id}: {source}")]
    ReconfigureFailed {
        id: String,
        #[source]
        source: ExecutorError,
    },

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("Manifest discovery failed: {0}")]
    Discovery(String),
}
