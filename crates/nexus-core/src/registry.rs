//! Executor registry managing the load/activate/unload lifecycle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use nexus_protocols::{
    DependencyError, Executor, ExecutorContext, ExecutorManifest, LoaderError, TaskSnapshot,
    Version,
};

use crate::dependency::resolve_load_order;
use crate::factory::ExecutorFactories;
use crate::source::ManifestSource;

/// A loaded executor instance.
struct LoadedExecutor {
    manifest: ExecutorManifest,
    executor: Arc<dyn Executor>,
    active: AtomicBool,
    loaded_at: DateTime<Utc>,
    config: RwLock<serde_json::Value>,
}

impl LoadedExecutor {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// An executor known to the registry, loaded or not.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableExecutor {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub version: Version,
    pub description: String,
    pub loaded: bool,
}

/// Status of a loaded executor.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutorStatus {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub version: Version,
    pub is_active: bool,
    pub loaded_at: DateTime<Utc>,
    pub capabilities: Vec<String>,
    pub config: serde_json::Value,
    pub status: serde_json::Value,
}

/// Per-kind counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub available: usize,
    pub loaded: usize,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub available: usize,
    pub loaded: usize,
    pub active: usize,
    pub by_kind: BTreeMap<String, KindStats>,
}

/// Registry of executor plugins.
///
/// `find_capable` and the read accessors may be called from any worker.
/// Lifecycle operations are serialized through an internal async lock so
/// dependency checks never race each other.
pub struct ExecutorRegistry {
    factories: Arc<ExecutorFactories>,
    sources: RwLock<Vec<Box<dyn ManifestSource>>>,
    /// Manifests from the last `scan`.
    discovered: RwLock<HashMap<String, ExecutorManifest>>,
    /// Manifests injected with `register_manifest`; these survive rescans.
    registered: RwLock<HashMap<String, ExecutorManifest>>,
    /// Loaded executors in load order.
    loaded: RwLock<Vec<Arc<LoadedExecutor>>>,
    overrides: RwLock<HashMap<String, serde_json::Value>>,
    work_dir: RwLock<PathBuf>,
    lifecycle: Mutex<()>,
}

impl ExecutorRegistry {
    /// Create a registry backed by the given factory table.
    pub fn new(factories: Arc<ExecutorFactories>) -> Self {
        Self {
            factories,
            sources: RwLock::new(Vec::new()),
            discovered: RwLock::new(HashMap::new()),
            registered: RwLock::new(HashMap::new()),
            loaded: RwLock::new(Vec::new()),
            overrides: RwLock::new(HashMap::new()),
            work_dir: RwLock::new(PathBuf::from(".")),
            lifecycle: Mutex::new(()),
        }
    }

    /// Create a registry with manifest sources attached.
    pub fn with_sources(
        factories: Arc<ExecutorFactories>,
        sources: Vec<Box<dyn ManifestSource>>,
    ) -> Self {
        let registry = Self::new(factories);
        *registry.sources.write() = sources;
        registry
    }

    /// Attach another manifest source. Later sources win on id collisions.
    pub fn add_source(&self, source: Box<dyn ManifestSource>) {
        self.sources.write().push(source);
    }

    pub fn set_work_dir(&self, work_dir: impl Into<PathBuf>) {
        *self.work_dir.write() = work_dir.into();
    }

    /// Configuration merged over the manifest config on instantiation.
    pub fn set_config_overrides(&self, id: impl Into<String>, config: serde_json::Value) {
        self.overrides.write().insert(id.into(), config);
    }

    /// Rediscover manifests from all sources.
    ///
    /// Replaces the discovered set; loaded instances are not affected. A
    /// failing source is logged and contributes nothing.
    pub fn scan(&self) -> Vec<ExecutorManifest> {
        let mut discovered = HashMap::new();

        for source in self.sources.read().iter() {
            match source.discover() {
                Ok(manifests) => {
                    for manifest in manifests {
                        if discovered.contains_key(&manifest.id) {
                            debug!("Manifest {} overridden by {} source", manifest.id, source.name());
                        }
                        discovered.insert(manifest.id.clone(), manifest);
                    }
                }
                Err(e) => warn!("Manifest source {} failed: {}", source.name(), e),
            }
        }

        info!("Discovered {} executor manifests", discovered.len());
        let mut manifests: Vec<ExecutorManifest> = discovered.values().cloned().collect();
        manifests.sort_by(|a, b| a.id.cmp(&b.id));
        *self.discovered.write() = discovered;
        manifests
    }

    /// Inject a manifest directly.
    pub fn register_manifest(&self, manifest: ExecutorManifest) {
        debug!("Registered manifest: {}", manifest.id);
        self.registered.write().insert(manifest.id.clone(), manifest);
    }

    /// Look up an available manifest by id.
    pub fn manifest(&self, id: &str) -> Option<ExecutorManifest> {
        if let Some(m) = self.registered.read().get(id) {
            return Some(m.clone());
        }
        self.discovered.read().get(id).cloned()
    }

    /// Load an executor and everything it depends on.
    ///
    /// Idempotent: a loaded executor is returned as is, without running
    /// initialization again. Dependencies are loaded and activated; the
    /// target itself is left inactive.
    pub async fn load(&self, id: &str) -> Result<Arc<dyn Executor>, LoaderError> {
        let _guard = self.lifecycle.lock().await;
        self.load_locked(id).await
    }

    async fn load_locked(&self, id: &str) -> Result<Arc<dyn Executor>, LoaderError> {
        if let Some(entry) = self.entry(id) {
            debug!("Executor already loaded: {}", id);
            return Ok(entry.executor.clone());
        }

        let order = resolve_load_order(id, &self.dependency_graph(), &self.loaded_ids())?;

        for dep in order.iter().filter(|dep| dep.as_str() != id) {
            let entry = match self.entry(dep) {
                Some(entry) => entry,
                None => self.instantiate(dep).await.map_err(|e| {
                    DependencyError::Unsatisfied {
                        executor: id.to_string(),
                        dependency: dep.clone(),
                        reason: e.to_string(),
                    }
                })?,
            };
            Self::set_active(&entry, true);
        }

        let entry = self.instantiate(id).await?;
        Ok(entry.executor.clone())
    }

    async fn instantiate(&self, id: &str) -> Result<Arc<LoadedExecutor>, LoaderError> {
        let manifest = self
            .manifest(id)
            .ok_or_else(|| LoaderError::NotFound(id.to_string()))?;
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| LoaderError::FactoryMissing(id.to_string()))?;

        info!("Loading executor: {} v{}", manifest.name, manifest.version);

        let config = merge_config(
            &serde_json::Value::Object(manifest.config.clone()),
            self.overrides.read().get(id),
        );
        let ctx = ExecutorContext::new(config.clone(), self.work_dir.read().clone());

        let mut executor = factory(manifest.clone());
        executor
            .initialize(ctx)
            .await
            .map_err(|source| LoaderError::InitializationFailed {
                id: id.to_string(),
                source,
            })?;

        let entry = Arc::new(LoadedExecutor {
            manifest,
            executor: Arc::from(executor),
            active: AtomicBool::new(false),
            loaded_at: Utc::now(),
            config: RwLock::new(config),
        });
        self.loaded.write().push(entry.clone());

        info!("Executor loaded: {}", id);
        Ok(entry)
    }

    /// Unload an executor. Returns `false` when the unload was refused or failed.
    pub async fn unload(&self, id: &str, force: bool) -> bool {
        match self.try_unload(id, force).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to unload {}: {}", id, e);
                false
            }
        }
    }

    /// Unload an executor, reporting why it could not be unloaded.
    ///
    /// Refused while another loaded executor depends on `id`, unless
    /// `force` is set. An id that is not loaded is a no-op.
    pub async fn try_unload(&self, id: &str, force: bool) -> Result<(), LoaderError> {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(id, force).await
    }

    async fn unload_locked(&self, id: &str, force: bool) -> Result<(), LoaderError> {
        let Some(entry) = self.entry(id) else {
            warn!("Executor not loaded: {}", id);
            return Ok(());
        };

        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            if !force {
                return Err(DependencyError::HasDependents {
                    executor: id.to_string(),
                    dependents,
                }
                .into());
            }
            warn!(
                "Force unloading {} while required by {}",
                id,
                dependents.join(", ")
            );
        }

        info!("Unloading executor: {}", id);
        Self::set_active(&entry, false);
        let shutdown = entry.executor.shutdown().await;
        self.loaded.write().retain(|e| e.manifest.id != id);

        shutdown.map_err(|source| LoaderError::ShutdownFailed {
            id: id.to_string(),
            source,
        })?;

        info!("Executor unloaded: {}", id);
        Ok(())
    }

    /// Make a loaded executor eligible for dispatch. `false` if not loaded.
    pub async fn activate(&self, id: &str) -> bool {
        let _guard = self.lifecycle.lock().await;
        match self.entry(id) {
            Some(entry) => {
                Self::set_active(&entry, true);
                true
            }
            None => {
                warn!("Cannot activate {}: not loaded", id);
                false
            }
        }
    }

    /// Remove a loaded executor from dispatch. `false` if not loaded.
    pub async fn deactivate(&self, id: &str) -> bool {
        let _guard = self.lifecycle.lock().await;
        match self.entry(id) {
            Some(entry) => {
                Self::set_active(&entry, false);
                true
            }
            None => {
                warn!("Cannot deactivate {}: not loaded", id);
                false
            }
        }
    }

    fn set_active(entry: &LoadedExecutor, active: bool) {
        let was = entry.active.swap(active, Ordering::SeqCst);
        if was != active {
            if active {
                info!("Executor activated: {}", entry.manifest.id);
            } else {
                info!("Executor deactivated: {}", entry.manifest.id);
            }
        }
    }

    /// Find the first active executor, in load order, that accepts the task.
    pub fn find_capable(&self, task: &TaskSnapshot) -> Option<Arc<dyn Executor>> {
        self.loaded
            .read()
            .iter()
            .find(|e| e.is_active() && e.executor.can_execute(task))
            .map(|e| e.executor.clone())
    }

    /// Unload, rescan and load again, restoring the activation flag.
    pub async fn reload(&self, id: &str) -> Result<Arc<dyn Executor>, LoaderError> {
        // Scan runs outside the lifecycle lock.
        self.scan();
        let _guard = self.lifecycle.lock().await;

        let was_active = self.entry(id).is_some_and(|e| e.is_active());
        info!("Reloading executor: {}", id);

        if let Err(e) = self.unload_locked(id, true).await {
            warn!("Shutdown during reload of {} failed: {}", id, e);
        }

        let executor = self.load_locked(id).await?;
        if was_active {
            if let Some(entry) = self.entry(id) {
                Self::set_active(&entry, true);
            }
        }
        Ok(executor)
    }

    /// Shallow-merge `patch` into a loaded executor's config and apply it.
    pub async fn update_config(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<serde_json::Value, LoaderError> {
        let _guard = self.lifecycle.lock().await;
        let entry = self
            .entry(id)
            .ok_or_else(|| LoaderError::NotFound(id.to_string()))?;

        let merged = merge_config(&entry.config.read(), Some(&patch));
        entry
            .executor
            .reconfigure(&merged)
            .map_err(|source| LoaderError::ReconfigureFailed {
                id: id.to_string(),
                source,
            })?;
        *entry.config.write() = merged.clone();

        info!("Executor configuration updated: {}", id);
        Ok(merged)
    }

    /// Every known manifest, sorted by id.
    pub fn list_available(&self) -> Vec<AvailableExecutor> {
        let loaded = self.loaded_ids();
        self.available_manifests()
            .into_iter()
            .map(|m| AvailableExecutor {
                loaded: loaded.contains(&m.id),
                id: m.id,
                name: m.name,
                kind: m.kind,
                version: m.version,
                description: m.description,
            })
            .collect()
    }

    /// Loaded executors in load order, optionally filtered by kind.
    pub fn list_loaded(&self, kind: Option<&str>) -> Vec<ExecutorStatus> {
        self.loaded
            .read()
            .iter()
            .filter(|e| kind.is_none_or(|k| e.manifest.kind == k))
            .map(|e| ExecutorStatus {
                id: e.manifest.id.clone(),
                name: e.manifest.name.clone(),
                kind: e.manifest.kind.clone(),
                version: e.manifest.version.clone(),
                is_active: e.is_active(),
                loaded_at: e.loaded_at,
                capabilities: e.manifest.capabilities.clone(),
                config: e.config.read().clone(),
                status: e.executor.status(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Executor>> {
        self.entry(id).map(|e| e.executor.clone())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.entry(id).is_some_and(|e| e.is_active())
    }

    /// Available manifests declaring every listed capability.
    pub fn find_with_capabilities(&self, capabilities: &[&str]) -> Vec<ExecutorManifest> {
        self.available_manifests()
            .into_iter()
            .filter(|m| capabilities.iter().all(|c| m.has_capability(c)))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();

        for manifest in self.available_manifests() {
            stats.available += 1;
            stats.by_kind.entry(manifest.kind).or_default().available += 1;
        }

        for entry in self.loaded.read().iter() {
            stats.loaded += 1;
            if entry.is_active() {
                stats.active += 1;
            }
            stats
                .by_kind
                .entry(entry.manifest.kind.clone())
                .or_default()
                .loaded += 1;
        }

        stats
    }

    /// Unload everything in reverse load order, ignoring dependents.
    pub async fn shutdown_all(&self) {
        let _guard = self.lifecycle.lock().await;
        let ids: Vec<String> = self
            .loaded
            .read()
            .iter()
            .rev()
            .map(|e| e.manifest.id.clone())
            .collect();

        info!("Shutting down {} executors", ids.len());
        for id in ids {
            if let Err(e) = self.unload_locked(&id, true).await {
                warn!("Failed to shut down {}: {}", id, e);
            }
        }
    }

    fn entry(&self, id: &str) -> Option<Arc<LoadedExecutor>> {
        self.loaded
            .read()
            .iter()
            .find(|e| e.manifest.id == id)
            .cloned()
    }

    fn loaded_ids(&self) -> HashSet<String> {
        self.loaded
            .read()
            .iter()
            .map(|e| e.manifest.id.clone())
            .collect()
    }

    fn dependents_of(&self, id: &str) -> Vec<String> {
        self.loaded
            .read()
            .iter()
            .filter(|e| e.manifest.id != id && e.manifest.depends_on(id))
            .map(|e| e.manifest.id.clone())
            .collect()
    }

    fn available_manifests(&self) -> Vec<ExecutorManifest> {
        let mut all = self.discovered.read().clone();
        for (id, manifest) in self.registered.read().iter() {
            all.insert(id.clone(), manifest.clone());
        }
        let mut manifests: Vec<ExecutorManifest> = all.into_values().collect();
        manifests.sort_by(|a, b| a.id.cmp(&b.id));
        manifests
    }

    /// Dependency edges of every available or loaded executor.
    fn dependency_graph(&self) -> HashMap<String, Vec<String>> {
        let mut graph: HashMap<String, Vec<String>> = self
            .available_manifests()
            .into_iter()
            .map(|m| (m.id, m.dependencies))
            .collect();
        for entry in self.loaded.read().iter() {
            graph
                .entry(entry.manifest.id.clone())
                .or_insert_with(|| entry.manifest.dependencies.clone());
        }
        graph
    }
}

/// Shallow merge of two JSON objects. Non-object overlays are ignored.
fn merge_config(base: &serde_json::Value, overlay: Option<&serde_json::Value>) -> serde_json::Value {
    let mut merged = match base {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Some(serde_json::Value::Object(overlay)) = overlay {
        for (key, value) in overlay {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
