// src/metrics.rs

//! Experiment counters, the active gauge and the duration histogram.
//!
//! Each `Metrics` value owns its own registry, so an operator and its tests
//! never share counters through global state.

use std::fmt;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

use crate::errors::Result;

pub struct Metrics {
    registry: Registry,
    pub experiments_created: IntCounter,
    pub experiments_executed: IntCounter,
    pub experiments_succeeded: IntCounter,
    pub experiments_failed: IntCounter,
    pub active_experiments: IntGauge,
    pub experiment_duration: Histogram,
    pub targets_affected: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("chaos".to_string()), None)?;

        let experiments_created = IntCounter::with_opts(Opts::new(
            "experiments_created_total",
            "The total number of chaos experiments created",
        ))?;
        let experiments_executed = IntCounter::with_opts(Opts::new(
            "experiments_executed_total",
            "The total number of chaos experiments executed",
        ))?;
        let experiments_succeeded = IntCounter::with_opts(Opts::new(
            "experiments_succeeded_total",
            "The total number of chaos experiments that succeeded",
        ))?;
        let experiments_failed = IntCounter::with_opts(Opts::new(
            "experiments_failed_total",
            "The total number of chaos experiments that failed",
        ))?;
        let active_experiments = IntGauge::with_opts(Opts::new(
            "experiments_active",
            "The number of currently active chaos experiments",
        ))?;
        let experiment_duration = Histogram::with_opts(HistogramOpts::new(
            "experiment_duration_seconds",
            "The duration of chaos experiments in seconds",
        ))?;
        let targets_affected = IntCounter::with_opts(Opts::new(
            "targets_affected_total",
            "The total number of targets affected by chaos experiments",
        ))?;

        registry.register(Box::new(experiments_created.clone()))?;
        registry.register(Box::new(experiments_executed.clone()))?;
        registry.register(Box::new(experiments_succeeded.clone()))?;
        registry.register(Box::new(experiments_failed.clone()))?;
        registry.register(Box::new(active_experiments.clone()))?;
        registry.register(Box::new(experiment_duration.clone()))?;
        registry.register(Box::new(targets_affected.clone()))?;

        Ok(Self {
            registry,
            experiments_created,
            experiments_executed,
            experiments_succeeded,
            experiments_failed,
            active_experiments,
            experiment_duration,
            targets_affected,
        })
    }

    /// Current value of the active-experiment gauge.
    pub fn active(&self) -> i64 {
        self.active_experiments.get()
    }

    /// Increment the active gauge; it is decremented when the guard drops.
    pub fn track_active(&self) -> ActiveGuard {
        self.active_experiments.inc();
        ActiveGuard {
            gauge: self.active_experiments.clone(),
        }
    }

    pub fn record_outcome(&self, success: bool) {
        if success {
            self.experiments_succeeded.inc();
        } else {
            self.experiments_failed.inc();
        }
    }

    /// Text exposition of every metric in this registry.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("active", &self.active())
            .field("created", &self.experiments_created.get())
            .finish_non_exhaustive()
    }
}

/// Keeps one experiment counted in the active gauge while alive.
pub struct ActiveGuard {
    gauge: IntGauge,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
