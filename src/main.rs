//! Nexus - pluggable task-execution engine
//!
//! Main entry point for the Nexus CLI.

mod bootstrap;
mod cli;
mod cmd_exec;
mod cmd_run;

use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = bootstrap::load_config(&cli.config)?;
    bootstrap::init_tracing(&config.logging)?;
    bootstrap::report_warnings(&config);

    let work_dir = match cli.work_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    info!("Nexus v{} (config {})", env!("CARGO_PKG_VERSION"), cli.config.display());

    match cli.command {
        None => cmd_run::run(&config, &work_dir, 30).await,
        Some(Commands::Run { stats_interval }) => {
            cmd_run::run(&config, &work_dir, stats_interval).await
        }
        Some(Commands::Exec {
            priority,
            timeout,
            shell,
            command,
        }) => {
            let request = cmd_exec::ExecRequest {
                priority,
                timeout,
                shell,
                command,
            };
            let succeeded = cmd_exec::exec(&config, &work_dir, request).await?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Executors { format }) => list_executors(&config, &work_dir, &format),
    }
}

fn list_executors(
    config: &nexus_config::Config,
    work_dir: &std::path::Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = bootstrap::build_registry(config, work_dir);
    let available = registry.scan();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&registry.list_available())?);
        return Ok(());
    }

    if available.is_empty() {
        println!("No executors found.");
        return Ok(());
    }

    println!("{:<24} {:<12} {:<10} DESCRIPTION", "ID", "TYPE", "VERSION");
    for executor in registry.list_available() {
        println!(
            "{:<24} {:<12} {:<10} {}",
            executor.id,
            executor.kind,
            executor.version.to_string(),
            executor.description
        );
    }
    Ok(())
}
