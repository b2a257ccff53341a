use super::*;
use async_trait::async_trait;
use nexus_protocols::{ExecutionOutput, ExecutorError, Parameters, TaskType};
use std::any::Any;
use std::sync::atomic::AtomicUsize;

use crate::source::StaticManifestSource;

#[derive(Default)]
struct Counters {
    initialized: AtomicUsize,
    shutdowns: AtomicUsize,
}

struct MockExecutor {
    manifest: ExecutorManifest,
    counters: Arc<Counters>,
    fail_init: bool,
    config: parking_lot::Mutex<serde_json::Value>,
}

#[async_trait]
impl Executor for MockExecutor {
    fn manifest(&self) -> &ExecutorManifest {
        &self.manifest
    }

    async fn initialize(&mut self, ctx: ExecutorContext) -> Result<(), ExecutorError> {
        if self.fail_init {
            return Err(ExecutorError::InitializationFailed("refused".to_string()));
        }
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        *self.config.lock() = ctx.config;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ExecutorError> {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn can_execute(&self, task: &TaskSnapshot) -> bool {
        task.str_parameter("wants")
            .is_some_and(|w| self.manifest.has_capability(w))
    }

    async fn execute(&self, _task: TaskSnapshot) -> Result<ExecutionOutput, ExecutorError> {
        Ok(ExecutionOutput::success(serde_json::json!({"by": self.manifest.id})))
    }

    fn reconfigure(&self, config: &serde_json::Value) -> Result<(), ExecutorError> {
        if config.get("reject").is_some() {
            return Err(ExecutorError::InvalidConfig("reject set".to_string()));
        }
        *self.config.lock() = config.clone();
        Ok(())
    }

    fn status(&self) -> serde_json::Value {
        serde_json::json!({"config": self.config.lock().clone()})
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn manifest(id: &str, deps: &[&str], caps: &[&str]) -> ExecutorManifest {
    ExecutorManifest::new(id, format!("Mock {id}"), Version::new(1, 0, 0))
        .with_dependencies(deps.iter().copied())
        .with_capabilities(caps.iter().copied())
}

struct Fixture {
    registry: ExecutorRegistry,
    counters: HashMap<String, Arc<Counters>>,
}

impl Fixture {
    /// Build a registry over `manifests`; ids in `failing` refuse to initialize.
    fn new(manifests: Vec<ExecutorManifest>, failing: &[&str]) -> Self {
        let factories = Arc::new(ExecutorFactories::new());
        let mut counters = HashMap::new();

        for m in &manifests {
            let c = Arc::new(Counters::default());
            counters.insert(m.id.clone(), c.clone());
            let fail_init = failing.contains(&m.id.as_str());
            factories.register(m.id.clone(), move |manifest| {
                Box::new(MockExecutor {
                    manifest,
                    counters: c.clone(),
                    fail_init,
                    config: parking_lot::Mutex::new(serde_json::Value::Null),
                }) as Box<dyn Executor>
            });
        }

        let registry = ExecutorRegistry::with_sources(
            factories,
            vec![Box::new(StaticManifestSource::new(manifests))],
        );
        registry.scan();
        Self { registry, counters }
    }

    fn initialized(&self, id: &str) -> usize {
        self.counters[id].initialized.load(Ordering::SeqCst)
    }

    fn shutdowns(&self, id: &str) -> usize {
        self.counters[id].shutdowns.load(Ordering::SeqCst)
    }
}

fn task_wanting(capability: &str) -> TaskSnapshot {
    let mut params = Parameters::new();
    params.insert("wants".to_string(), serde_json::json!(capability));
    TaskSnapshot::new(TaskType::Generation, "test", params)
}

#[tokio::test]
async fn test_load_is_idempotent() {
    let fx = Fixture::new(vec![manifest("a", &[], &["x"])], &[]);

    let first = fx.registry.load("a").await.unwrap();
    let second = fx.registry.load("a").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.initialized("a"), 1);
    assert_eq!(fx.registry.list_loaded(None).len(), 1);
}

#[tokio::test]
async fn test_load_leaves_target_inactive_and_activates_dependencies() {
    let fx = Fixture::new(
        vec![manifest("base", &[], &[]), manifest("child", &["base"], &[])],
        &[],
    );

    fx.registry.load("child").await.unwrap();

    assert!(fx.registry.is_loaded("base"));
    assert!(fx.registry.is_active("base"));
    assert!(fx.registry.is_loaded("child"));
    assert!(!fx.registry.is_active("child"));

    let order: Vec<String> = fx
        .registry
        .list_loaded(None)
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(order, vec!["base", "child"]);
}

#[tokio::test]
async fn test_load_unknown_executor() {
    let fx = Fixture::new(vec![], &[]);
    let err = fx.registry.load("ghost").await.err().unwrap();
    assert!(matches!(err, LoaderError::NotFound(_)));
}

#[tokio::test]
async fn test_load_without_factory() {
    let registry = ExecutorRegistry::new(Arc::new(ExecutorFactories::new()));
    registry.register_manifest(manifest("orphan", &[], &[]));

    let err = registry.load("orphan").await.err().unwrap();
    assert!(matches!(err, LoaderError::FactoryMissing(id) if id == "orphan"));
    assert!(!registry.is_loaded("orphan"));
}

#[tokio::test]
async fn test_initialization_failure_discards_instance() {
    let fx = Fixture::new(vec![manifest("bad", &[], &[])], &["bad"]);

    let err = fx.registry.load("bad").await.err().unwrap();
    assert!(matches!(err, LoaderError::InitializationFailed { .. }));
    assert!(!fx.registry.is_loaded("bad"));
}

#[tokio::test]
async fn test_missing_dependency_fails() {
    let fx = Fixture::new(vec![manifest("child", &["nowhere"], &[])], &[]);

    let err = fx.registry.load("child").await.err().unwrap();
    assert!(matches!(
        err,
        LoaderError::Dependency(DependencyError::Unsatisfied { ref dependency, .. })
            if dependency == "nowhere"
    ));
    assert!(!fx.registry.is_loaded("child"));
}

#[tokio::test]
async fn test_failing_dependency_fails_dependent() {
    let fx = Fixture::new(
        vec![manifest("base", &[], &[]), manifest("child", &["base"], &[])],
        &["base"],
    );

    let err = fx.registry.load("child").await.err().unwrap();
    assert!(matches!(err, LoaderError::Dependency(_)));
    assert!(!fx.registry.is_loaded("child"));
    assert_eq!(fx.initialized("child"), 0);
}

#[tokio::test]
async fn test_cycle_fails_before_loading_anything() {
    let fx = Fixture::new(
        vec![
            manifest("a", &["b"], &[]),
            manifest("b", &["c"], &[]),
            manifest("c", &["a"], &[]),
        ],
        &[],
    );

    let err = fx.registry.load("a").await.err().unwrap();
    assert!(matches!(
        err,
        LoaderError::Dependency(DependencyError::Cycle { .. })
    ));
    assert!(fx.registry.list_loaded(None).is_empty());
    assert_eq!(fx.initialized("c"), 0);
}

#[tokio::test]
async fn test_unload_refused_with_dependent_unless_forced() {
    let fx = Fixture::new(
        vec![manifest("base", &[], &[]), manifest("child", &["base"], &[])],
        &[],
    );
    fx.registry.load("child").await.unwrap();
    fx.registry.activate("child").await;

    assert!(!fx.registry.unload("base", false).await);
    let err = fx.registry.try_unload("base", false).await.unwrap_err();
    assert!(matches!(
        err,
        LoaderError::Dependency(DependencyError::HasDependents { ref dependents, .. })
            if dependents == &vec!["child".to_string()]
    ));
    assert!(fx.registry.is_active("base"));

    assert!(fx.registry.unload("base", true).await);
    assert!(!fx.registry.is_loaded("base"));
    assert!(fx.registry.is_loaded("child"));
    assert_eq!(fx.shutdowns("base"), 1);
}

#[tokio::test]
async fn test_unload_not_loaded_is_noop() {
    let fx = Fixture::new(vec![manifest("a", &[], &[])], &[]);
    assert!(fx.registry.unload("a", false).await);
    assert!(fx.registry.unload("never-heard-of-it", false).await);
}

#[tokio::test]
async fn test_activate_deactivate() {
    let fx = Fixture::new(vec![manifest("a", &[], &[])], &[]);

    assert!(!fx.registry.activate("a").await);

    fx.registry.load("a").await.unwrap();
    assert!(fx.registry.activate("a").await);
    assert!(fx.registry.activate("a").await);
    assert!(fx.registry.is_active("a"));

    assert!(fx.registry.deactivate("a").await);
    assert!(fx.registry.deactivate("a").await);
    assert!(!fx.registry.is_active("a"));
}

#[tokio::test]
async fn test_find_capable_requires_active() {
    let fx = Fixture::new(vec![manifest("a", &[], &["echo"])], &[]);
    let task = task_wanting("echo");

    assert!(fx.registry.find_capable(&task).is_none());

    fx.registry.load("a").await.unwrap();
    assert!(fx.registry.find_capable(&task).is_none());

    fx.registry.activate("a").await;
    let found = fx.registry.find_capable(&task).unwrap();
    assert_eq!(found.manifest().id, "a");

    assert!(fx.registry.find_capable(&task_wanting("other")).is_none());
}

#[tokio::test]
async fn test_find_capable_first_match_in_load_order() {
    let fx = Fixture::new(
        vec![manifest("first", &[], &["echo"]), manifest("second", &[], &["echo"])],
        &[],
    );
    fx.registry.load("second").await.unwrap();
    fx.registry.load("first").await.unwrap();
    fx.registry.activate("first").await;
    fx.registry.activate("second").await;

    let found = fx.registry.find_capable(&task_wanting("echo")).unwrap();
    assert_eq!(found.manifest().id, "second");
}

#[tokio::test]
async fn test_scan_replaces_discovered_set_only() {
    let fx = Fixture::new(vec![manifest("a", &[], &[])], &[]);
    fx.registry.load("a").await.unwrap();

    *fx.registry.sources.write() = Vec::new();
    assert!(fx.registry.scan().is_empty());

    assert!(fx.registry.is_loaded("a"));
    assert!(fx.registry.list_available().is_empty());
}

#[tokio::test]
async fn test_registered_manifest_survives_scan() {
    let fx = Fixture::new(vec![], &[]);
    fx.registry.register_manifest(manifest("injected", &[], &[]));
    fx.registry.scan();

    let available = fx.registry.list_available();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, "injected");
    assert!(!available[0].loaded);
}

#[tokio::test]
async fn test_reload_reinitializes_and_restores_active() {
    let fx = Fixture::new(vec![manifest("a", &[], &[])], &[]);
    let before = fx.registry.load("a").await.unwrap();
    fx.registry.activate("a").await;

    let after = fx.registry.reload("a").await.unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(fx.initialized("a"), 2);
    assert_eq!(fx.shutdowns("a"), 1);
    assert!(fx.registry.is_active("a"));
}

#[tokio::test]
async fn test_config_overrides_merged_on_load() {
    let m = manifest("a", &[], &[]).with_config(serde_json::json!({"depth": 1, "mode": "fast"}));
    let fx = Fixture::new(vec![m], &[]);
    fx.registry
        .set_config_overrides("a", serde_json::json!({"depth": 5}));

    fx.registry.load("a").await.unwrap();

    let status = &fx.registry.list_loaded(None)[0];
    assert_eq!(status.config["depth"], 5);
    assert_eq!(status.config["mode"], "fast");
    assert_eq!(status.status["config"]["depth"], 5);
}

#[tokio::test]
async fn test_update_config() {
    let m = manifest("a", &[], &[]).with_config(serde_json::json!({"depth": 1}));
    let fx = Fixture::new(vec![m], &[]);
    fx.registry.load("a").await.unwrap();

    let merged = fx
        .registry
        .update_config("a", serde_json::json!({"extra": true}))
        .await
        .unwrap();
    assert_eq!(merged["depth"], 1);
    assert_eq!(merged["extra"], true);

    let err = fx
        .registry
        .update_config("a", serde_json::json!({"reject": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, LoaderError::ReconfigureFailed { .. }));
    assert!(fx.registry.list_loaded(None)[0].config.get("reject").is_none());

    let err = fx
        .registry
        .update_config("missing", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, LoaderError::NotFound(_)));
}

#[tokio::test]
async fn test_listing_and_stats() {
    let fx = Fixture::new(
        vec![
            manifest("a", &[], &["read", "write"]),
            manifest("b", &[], &["read"]).with_kind("analyzers"),
            manifest("c", &[], &[]),
        ],
        &[],
    );
    fx.registry.load("a").await.unwrap();
    fx.registry.load("b").await.unwrap();
    fx.registry.activate("a").await;

    assert_eq!(fx.registry.list_loaded(Some("analyzers")).len(), 1);
    assert_eq!(fx.registry.list_loaded(Some("executors")).len(), 1);

    let both: Vec<String> = fx
        .registry
        .find_with_capabilities(&["read", "write"])
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(both, vec!["a"]);
    assert_eq!(fx.registry.find_with_capabilities(&["read"]).len(), 2);

    let stats = fx.registry.stats();
    assert_eq!(stats.available, 3);
    assert_eq!(stats.loaded, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(
        stats.by_kind["executors"],
        KindStats {
            available: 2,
            loaded: 1
        }
    );
    assert_eq!(stats.by_kind["analyzers"].loaded, 1);
}

#[tokio::test]
async fn test_shutdown_all() {
    let fx = Fixture::new(
        vec![manifest("base", &[], &[]), manifest("child", &["base"], &[])],
        &[],
    );
    fx.registry.load("child").await.unwrap();

    fx.registry.shutdown_all().await;

    assert!(fx.registry.list_loaded(None).is_empty());
    assert_eq!(fx.shutdowns("base"), 1);
    assert_eq!(fx.shutdowns("child"), 1);
}

#[test]
fn test_merge_config_shallow() {
    let merged = merge_config(
        &serde_json::json!({"a": 1, "nested": {"x": 1}}),
        Some(&serde_json::json!({"nested": {"y": 2}, "b": 2})),
    );
    assert_eq!(merged["a"], 1);
    assert_eq!(merged["b"], 2);
    assert_eq!(merged["nested"], serde_json::json!({"y": 2}));
    assert_eq!(merge_config(&serde_json::Value::Null, None), serde_json::json!({}));
}

/// Records whether the lifecycle lock was held while discovery ran.
struct LockObservingSource {
    manifests: Vec<ExecutorManifest>,
    registry: Arc<std::sync::OnceLock<std::sync::Weak<ExecutorRegistry>>>,
    scanned_under_lock: Arc<std::sync::atomic::AtomicBool>,
}

impl ManifestSource for LockObservingSource {
    fn name(&self) -> &str {
        "observing"
    }

    fn discover(&self) -> Result<Vec<ExecutorManifest>, LoaderError> {
        if let Some(registry) = self.registry.get().and_then(|w| w.upgrade()) {
            if registry.lifecycle.try_lock().is_err() {
                self.scanned_under_lock.store(true, Ordering::SeqCst);
            }
        }
        Ok(self.manifests.clone())
    }
}

#[tokio::test]
async fn test_reload_scans_outside_lifecycle_lock() {
    let factories = Arc::new(ExecutorFactories::new());
    let counters = Arc::new(Counters::default());
    factories.register("a", move |manifest| {
        Box::new(MockExecutor {
            manifest,
            counters: counters.clone(),
            fail_init: false,
            config: parking_lot::Mutex::new(serde_json::Value::Null),
        }) as Box<dyn Executor>
    });

    let handle = Arc::new(std::sync::OnceLock::new());
    let scanned_under_lock = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let registry = Arc::new(ExecutorRegistry::with_sources(
        factories,
        vec![Box::new(LockObservingSource {
            manifests: vec![manifest("a", &[], &[])],
            registry: handle.clone(),
            scanned_under_lock: scanned_under_lock.clone(),
        })],
    ));
    let _ = handle.set(Arc::downgrade(&registry));

    registry.scan();
    registry.load("a").await.unwrap();
    registry.reload("a").await.unwrap();

    assert!(registry.is_loaded("a"));
    assert!(!scanned_under_lock.load(Ordering::SeqCst));
}
