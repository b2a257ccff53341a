//! Explicit executor registration table.

use dashmap::DashMap;
use std::sync::Arc;

use nexus_protocols::{Executor, ExecutorManifest};

/// Constructor for an executor, given the manifest it was discovered with.
pub type ExecutorFactory = Arc<dyn Fn(ExecutorManifest) -> Box<dyn Executor> + Send + Sync>;

/// Table of executor constructors keyed by manifest id.
///
/// Manifests describe what an executor is; the factory table decides what
/// code backs it. A manifest without a factory cannot be loaded.
pub struct ExecutorFactories {
    factories: DashMap<String, ExecutorFactory>,
}

impl ExecutorFactories {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register a factory, replacing any previous one for the same id.
    pub fn register<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn(ExecutorManifest) -> Box<dyn Executor> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn get(&self, id: &str) -> Option<ExecutorFactory> {
        self.factories.get(id).map(|f| f.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Default for ExecutorFactories {
    fn default() -> Self {
        Self::new()
    }
}
