// src/logging.rs

//! Logging setup for `chaos-operator` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CHAOS_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs go to STDERR; `--dry-run` and `--run` print their report on stdout.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "CHAOS_LOG";

/// HTTP and kube client internals stay quiet unless asked for at trace.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "tower", "kube_client"];

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("failed to install tracing subscriber")
}

/// Filter at `level` for this crate, capped at `warn` for client internals
/// unless `level` is `trace`.
pub fn filter_for(level: Level) -> EnvFilter {
    let mut directives = vec![level.as_str().to_lowercase()];
    if level != Level::TRACE {
        directives.extend(NOISY_TARGETS.iter().map(|t| format!("{t}=warn")));
    }
    EnvFilter::new(directives.join(","))
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
