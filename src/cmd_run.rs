//! Foreground engine run.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info};

use nexus_config::Config;

use crate::bootstrap;

/// Start the engine and serve until Ctrl-C.
pub(crate) async fn run(
    config: &Config,
    work_dir: &Path,
    stats_interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Working directory: {}", work_dir.display());

    let engine = bootstrap::build_engine(config, work_dir);
    engine.start().await?;

    for executor in engine.list_loaded() {
        info!(
            "Executor {} v{} ({})",
            executor.id,
            executor.version,
            if executor.is_active { "active" } else { "inactive" }
        );
    }
    info!("Nexus ready with {} workers", config.engine.workers);

    let mut ticker = tokio::time::interval(Duration::from_secs(stats_interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = ticker.tick() => {
                let stats = engine.statistics();
                info!(
                    "queue={} running={} completed={} failed={} cancelled={} workers={}/{}",
                    stats.queue.total(),
                    stats.tasks.running,
                    stats.totals.completed,
                    stats.totals.failed,
                    stats.totals.cancelled,
                    stats.workers.active,
                    stats.workers.total,
                );
            }
        }
    }

    info!("Shutting down...");
    engine.shutdown().await;
    Ok(())
}
