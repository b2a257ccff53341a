//! # Nexus Protocols
//!
//! Core protocol definitions for the Nexus task-execution engine.
//! Contains only interface definitions and plain data - no engine logic.
//!
//! ## Core Types
//!
//! - [`Executor`] - Trait implemented by every executor plugin
//! - [`ExecutorManifest`] - Immutable descriptor of a plugin
//! - [`TaskSnapshot`] - Read-only view of a task handed to an executor
//! - [`ExecutionOutput`] - What an executor reports back

pub mod error;
pub mod executor;
pub mod types;

pub use error::{DependencyError, ExecutorError, LoaderError};
pub use executor::{
    ExecutionOutput, Executor, ExecutorContext, ExecutorManifest, OutputStatus, Parameters,
    TaskSnapshot,
};
pub use types::*;
