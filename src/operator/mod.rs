// src/operator/mod.rs

//! Registry of running experiment controllers.
//!
//! The operator is the long-lived entry point: callers start, stop and
//! query experiments by id, and an optional reconcile loop converges the
//! registry with an [`ExperimentSource`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cluster::ClusterClient;
use crate::controller::{Controller, ControllerDeps};
use crate::errors::{ChaosError, Result};
use crate::experiment::ExperimentConfig;
use crate::metrics::Metrics;
use crate::types::ExperimentStatus;

pub mod source;

pub use source::{ConfigFileSource, ExperimentSource, StaticSource};

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSettings {
    pub reconcile_interval: Duration,
    /// Per-call timeout for external inject / cleanup requests.
    pub request_timeout: Duration,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// What one reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.failed.is_empty()
    }
}

pub struct Operator {
    deps: ControllerDeps,
    settings: OperatorSettings,
    controllers: RwLock<HashMap<String, Arc<Controller>>>,
    /// Ids this operator started from its source; only these are reconciled.
    managed: Mutex<HashSet<String>>,
    source: Option<Arc<dyn ExperimentSource>>,
    shutdown: CancellationToken,
    reconcile_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("settings", &self.settings)
            .field("experiments", &self.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Operator {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        metrics: Arc<Metrics>,
        settings: OperatorSettings,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            deps: ControllerDeps {
                cluster,
                metrics,
                http,
                request_timeout: settings.request_timeout,
            },
            settings,
            controllers: RwLock::new(HashMap::new()),
            managed: Mutex::new(HashSet::new()),
            source: None,
            shutdown: CancellationToken::new(),
            reconcile_task: Mutex::new(None),
        })
    }

    /// Attach the desired-state source the reconcile loop reads.
    pub fn with_source(mut self, source: Arc<dyn ExperimentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.deps.metrics
    }

    fn len(&self) -> usize {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Build and start a controller for `config` and register it.
    ///
    /// Construction and start errors are returned here and nothing is
    /// registered. An id already in the registry is rejected, whatever the
    /// status of the experiment under it.
    pub fn run_experiment(&self, config: &ExperimentConfig) -> Result<()> {
        config.validate()?;

        let mut controllers = self
            .controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if controllers.contains_key(&config.id) {
            return Err(ChaosError::DuplicateExperiment(config.id.clone()));
        }

        let controller = Controller::build(config, &self.deps)?;
        controller.start()?;
        controllers.insert(config.id.clone(), Arc::new(controller));
        drop(controllers);

        self.deps.metrics.experiments_created.inc();
        self.deps.metrics.experiments_executed.inc();
        info!(experiment = %config.id, fault = %config.fault_type, "experiment started");
        Ok(())
    }

    /// Stop an experiment and remove it from the registry.
    ///
    /// The controller stays registered until its stop has completed.
    pub async fn stop_experiment(&self, id: &str) -> Result<()> {
        let controller = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ChaosError::ExperimentNotFound(id.to_string()))?;

        controller.stop().await?;

        {
            let mut controllers = self
                .controllers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            // A concurrent stop may already have removed it and a new run
            // may have reused the id.
            if controllers
                .get(id)
                .is_some_and(|current| Arc::ptr_eq(current, &controller))
            {
                controllers.remove(id);
                self.managed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(id);
            }
        }

        info!(experiment = %id, status = %controller.status(), "experiment stopped");
        Ok(())
    }

    pub fn get_experiment_status(&self, id: &str) -> Result<ExperimentStatus> {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|c| c.status())
            .ok_or_else(|| ChaosError::ExperimentNotFound(id.to_string()))
    }

    /// Current value of the active-experiment gauge.
    pub fn active_count(&self) -> i64 {
        self.deps.metrics.active()
    }

    /// Registered experiments and their statuses, sorted by id.
    pub fn list_experiments(&self) -> Vec<(String, ExperimentStatus)> {
        let mut all: Vec<(String, ExperimentStatus)> = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, c)| (id.clone(), c.status()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Converge the registry with the source.
    ///
    /// Starts every desired experiment that is not registered and stops
    /// every experiment this operator started from the source that is no
    /// longer desired. Experiments started through
    /// [`run_experiment`](Self::run_experiment) are left alone.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let Some(source) = self.source.as_ref() else {
            return Ok(report);
        };

        let desired = source.desired().await?;
        let desired_ids: BTreeSet<&str> = desired.iter().map(|c| c.id.as_str()).collect();

        for config in &desired {
            let registered = self
                .controllers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&config.id);
            if registered {
                continue;
            }

            match self.run_experiment(config) {
                Ok(()) => {
                    self.managed
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(config.id.clone());
                    report.started.push(config.id.clone());
                }
                Err(err) => {
                    warn!(experiment = %config.id, error = %err, "reconcile could not start experiment");
                    report.failed.push(config.id.clone());
                }
            }
        }

        let mut undesired: Vec<String> = self
            .managed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|id| !desired_ids.contains(id.as_str()))
            .cloned()
            .collect();
        undesired.sort();

        for id in undesired {
            match self.stop_experiment(&id).await {
                Ok(()) => report.stopped.push(id),
                Err(ChaosError::ExperimentNotFound(_)) => {
                    self.managed
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&id);
                }
                Err(err) => {
                    warn!(experiment = %id, error = %err, "reconcile could not stop experiment");
                    report.failed.push(id);
                }
            }
        }

        if !report.is_noop() {
            info!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                failed = report.failed.len(),
                "reconcile pass applied changes"
            );
        }
        Ok(report)
    }

    /// Launch the reconcile loop.
    ///
    /// Ticks every `reconcile_interval` until [`stop`](Self::stop) is called.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self
            .reconcile_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("reconcile loop already running");
            return;
        }

        let operator = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let period = self.settings.reconcile_interval;

        *slot = Some(tokio::spawn(async move {
            info!(interval = ?period, "operator reconcile loop started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = operator.reconcile().await {
                            error!(error = %err, "reconcile failed");
                        }
                    }
                }
            }
            info!("operator reconcile loop exited");
        }));
    }

    /// Stop the reconcile loop, then every registered experiment.
    ///
    /// Individual stop failures are logged and do not abort the shutdown.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let task = self
            .reconcile_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "reconcile loop panicked");
            }
        }

        let mut ids: Vec<String> = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();

        for id in ids {
            if let Err(err) = self.stop_experiment(&id).await {
                error!(experiment = %id, error = %err, "error stopping experiment during shutdown");
            }
        }
        info!("operator stopped");
    }
}
