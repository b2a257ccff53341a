//! Tracing setup and engine wiring shared by the subcommands.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use nexus_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use nexus_core::{DirectoryManifestSource, ExecutorFactories, ExecutorRegistry, StaticManifestSource};
use nexus_executor_command::CommandExecutor;
use nexus_workqueue::{ExecutionEngine, QueueConfig};

/// Keeps the non-blocking file writer flushing for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Files rotate daily under
/// `logging.directory` when it is set.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if logging.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.directory {
        Some(dir) => {
            let log_dir = PathBuf::from(ConfigLoader::expand_path(dir));
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("nexus")
                .filename_suffix("log")
                .max_log_files(14)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}

/// Load the config file, falling back to defaults when it is missing.
pub(crate) fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(path)?;

    let result = ConfigValidator::validate(&config);
    if !result.is_valid() {
        let errors: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        return Err(format!("Invalid configuration: {}", errors.join("; ")).into());
    }
    Ok(config)
}

/// Log validation warnings once tracing is up.
pub(crate) fn report_warnings(config: &Config) {
    for warning in ConfigValidator::validate(config).warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
}

/// Registry with the built-in executors registered and the configured
/// manifest sources attached.
pub(crate) fn build_registry(config: &Config, work_dir: &Path) -> Arc<ExecutorRegistry> {
    let factories = Arc::new(ExecutorFactories::new());
    nexus_executor_command::register(&factories);

    let registry = ExecutorRegistry::new(factories);
    registry.add_source(Box::new(StaticManifestSource::new(vec![
        CommandExecutor::default_manifest(),
    ])));

    if let Some(dir) = &config.modules.directory {
        let root = PathBuf::from(ConfigLoader::expand_path(dir));
        info!("Manifest directory: {}", root.display());
        registry.add_source(Box::new(DirectoryManifestSource::new(root)));
    }

    for (id, overrides) in &config.executors {
        registry.set_config_overrides(id.clone(), overrides.clone());
    }

    registry.set_work_dir(work_dir.to_path_buf());
    Arc::new(registry)
}

pub(crate) fn build_engine(config: &Config, work_dir: &Path) -> ExecutionEngine {
    let registry = build_registry(config, work_dir);
    let engine = ExecutionEngine::new(QueueConfig::from(&config.engine), registry);
    if config.engine.default_executors.is_empty() {
        warn!("No default executors configured; tasks will fail until one is loaded");
    }
    engine
}
