//! # Nexus Workqueue
//!
//! Task queue and worker pool for the Nexus engine.
//!
//! ## Features
//!
//! - Three strict priority tiers (urgent, normal, batch), FIFO within a tier
//! - Fixed-size worker pool dispatching to the first capable executor
//! - [`ExecutionEngine`] facade with an explicit start/stop lifecycle

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod stats;
pub mod task;
pub mod worker;

pub use config::QueueConfig;
pub use engine::ExecutionEngine;
pub use error::QueueError;
pub use queue::PriorityTaskQueue;
pub use stats::{EngineStatistics, ExecutorCounters, QueueTotals, StatusCounts, TierDepths, WorkerStats};
pub use task::{NewTask, PriorityTier, Task, TaskStatus};
pub use worker::{Worker, WorkerPool};
