//! # Nexus Core
//!
//! Executor lifecycle management for the Nexus engine.
//!
//! ## Components
//!
//! - [`ExecutorRegistry`] - Loads, activates and unloads executors in dependency order
//! - [`ExecutorFactories`] - Explicit table of executor constructors keyed by manifest id
//! - [`ManifestSource`] - Where executor manifests come from

pub mod dependency;
pub mod factory;
pub mod registry;
pub mod source;

pub use dependency::resolve_load_order;
pub use factory::{ExecutorFactories, ExecutorFactory};
pub use registry::{AvailableExecutor, ExecutorRegistry, ExecutorStatus, KindStats, RegistryStats};
pub use source::{DirectoryManifestSource, ManifestSource, StaticManifestSource};
