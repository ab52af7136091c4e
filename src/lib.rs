// src/lib.rs

pub mod cli;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod errors;
pub mod executor;
pub mod experiment;
pub mod logging;
pub mod metrics;
pub mod operator;
pub mod scheduler;
pub mod store;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::cluster::mock::MockCluster;
use crate::cluster::{ClusterClient, KubeCluster};
use crate::config::{ConfigFile, load_and_validate};
use crate::executor::Executor;
use crate::metrics::Metrics;
use crate::operator::{ConfigFileSource, Operator};
use crate::scheduler::Scheduler;
use crate::store::InMemoryStore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - cluster client, store and metrics
/// - executor (for `--run`), operator and scheduler
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let metrics = Arc::new(Metrics::new()?);
    let cluster = connect_cluster(args.mock_cluster || cfg.cluster.mock).await?;

    let store = Arc::new(InMemoryStore::new());
    for experiment in cfg.experiments()? {
        store.insert(experiment);
    }

    let executor = Arc::new(Executor::new(store.clone(), cluster.clone(), metrics.clone()));

    if let Some(id) = args.run.as_deref() {
        return run_once(&executor, &store, id).await;
    }

    let operator = Arc::new(
        Operator::new(cluster, metrics.clone(), cfg.operator_settings())?
            .with_source(Arc::new(ConfigFileSource::new(config_path.clone()))),
    );
    operator.start();

    let scheduler = Scheduler::with_tick_interval(executor.clone(), cfg.scheduler_tick());
    for schedule in cfg.schedules() {
        scheduler.add_schedule(schedule)?;
    }
    scheduler.start();

    info!(config = %config_path.display(), "chaos operator running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("shutdown requested");

    scheduler.stop().await;
    operator.stop().await;

    match metrics.render() {
        Ok(text) => debug!(metrics = %text, "final metrics"),
        Err(err) => warn!(error = %err, "could not render metrics"),
    }
    Ok(())
}

async fn connect_cluster(mock: bool) -> Result<Arc<dyn ClusterClient>> {
    if mock {
        info!("using in-memory mock cluster");
        return Ok(Arc::new(MockCluster::new()));
    }
    let cluster = KubeCluster::try_default()
        .await
        .context("connecting to Kubernetes")?;
    Ok(Arc::new(cluster))
}

/// `--run <id>`: execute one stored experiment and report on stdout.
async fn run_once(executor: &Executor, store: &InMemoryStore, id: &str) -> Result<()> {
    let outcome = executor.execute_experiment(id).await;
    let status = store
        .status_of(id)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match outcome {
        Ok(result) => {
            println!("experiment {id}: {status}");
            println!("  duration: {:.2}s", result.duration);
            if !result.affected_resources.is_empty() {
                println!("  affected: {}", result.affected_resources.join(", "));
            }
            for (name, value) in result.metrics.iter() {
                println!("  {name}: {value}");
            }
            Ok(())
        }
        Err(err) => {
            println!("experiment {id}: {status}");
            Err(err).with_context(|| format!("experiment {id} did not complete"))
        }
    }
}

/// Print the validated experiments and schedules without running anything.
fn print_dry_run(cfg: &ConfigFile) {
    println!("chaos-operator dry-run");
    println!(
        "  operator.reconcile_interval_secs = {}",
        cfg.operator.reconcile_interval_secs
    );
    println!(
        "  scheduler.tick_interval_secs = {}",
        cfg.scheduler.tick_interval_secs
    );
    println!("  cluster.mock = {}", cfg.cluster.mock);
    println!();

    println!("experiments ({}):", cfg.experiment.len());
    for config in cfg.experiment_configs() {
        let managed = cfg
            .experiment
            .get(&config.id)
            .is_some_and(|entry| entry.managed);
        println!("  - {}", config.id);
        println!("      type: {}", config.fault_type);
        println!("      duration: {}s", config.duration);
        if !config.target.is_empty() {
            println!("      target: {}", config.target);
        }
        if config.is_external() {
            println!("      controller: external");
        }
        if managed {
            println!("      managed: true");
        }
        for (key, value) in config.params.iter() {
            if key == "auth_token" {
                println!("      {key}: <redacted>");
            } else {
                println!("      {key}: {value}");
            }
        }
    }

    let now = chrono::Utc::now();
    println!();
    println!("schedules ({}):", cfg.schedule.len());
    for schedule in cfg.schedules() {
        println!("  - {} -> {}", schedule.id, schedule.experiment_id);
        println!("      type: {}", schedule.kind);
        if let Some(at) = schedule.execute_at {
            println!("      execute_at: {}", at.to_rfc3339());
        }
        if let Some(ref expr) = schedule.cron_expression {
            println!("      cron: {expr} (not fired)");
            if let Some(next) = schedule.next_cron_occurrence(now) {
                println!("      next match: {}", next.to_rfc3339());
            }
        }
        if !schedule.enabled {
            println!("      enabled: false");
        }
    }

    debug!("dry-run complete (no execution)");
}
