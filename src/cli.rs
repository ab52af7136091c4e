// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `chaos-operator`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chaos-operator",
    version,
    about = "Run, schedule and reconcile chaos experiments.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Chaos.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Chaos.toml")]
    pub config: String,

    /// Use the in-memory cluster instead of Kubernetes, whatever
    /// `[cluster].mock` says.
    #[arg(long)]
    pub mock_cluster: bool,

    /// Execute one declared experiment through the executor and exit.
    #[arg(long, value_name = "EXPERIMENT_ID")]
    pub run: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHAOS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print experiments and schedules, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
