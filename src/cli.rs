//! CLI definitions for Nexus.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nexus CLI.
#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Pluggable task-execution engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "nexus.toml", global = true)]
    pub config: PathBuf,

    /// Working directory for executors
    #[arg(short, long, global = true)]
    pub work_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the engine in foreground until Ctrl-C (default)
    Run {
        /// Seconds between statistics log lines
        #[arg(long, default_value_t = 30)]
        stats_interval: u64,
    },

    /// Run a single command through the engine and print the task
    Exec {
        /// Task priority, 1 (lowest) to 10 (highest)
        #[arg(short, long, default_value_t = 5)]
        priority: u8,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Run through `sh -c`
        #[arg(long)]
        shell: bool,

        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// List executors found by a manifest scan
    Executors {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}
