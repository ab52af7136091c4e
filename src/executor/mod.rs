// src/executor/mod.rs

//! Direct-run path: execute one stored experiment by id and wait for it.
//!
//! Unlike the operator, nothing is registered. The caller gets the
//! [`ExperimentResult`] (or the dispatch error) back once the run is over,
//! and the store holds the terminal status.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::ClusterClient;
use crate::errors::{ChaosError, Result};
use crate::experiment::{Experiment, ExperimentResult, extract_params, run_pod_failure, run_simulated};
use crate::metrics::Metrics;
use crate::store::ExperimentStore;
use crate::types::{ExperimentStatus, FaultType};

/// Slack added to the declared duration before the hard deadline fires.
///
/// The hold starts after the cluster calls, so this is also the time the
/// listing and deletions may take before the deadline cuts the hold short.
pub const DEFAULT_DEADLINE_GRACE: Duration = Duration::from_secs(60);

pub type RunnerFuture<'a> = Pin<Box<dyn Future<Output = Result<ExperimentResult>> + Send + 'a>>;

/// Anything that can run a stored experiment by id.
///
/// The scheduler fires through this seam; [`Executor`] is the production
/// implementation.
pub trait ExperimentRunner: Send + Sync {
    fn run_experiment<'a>(&'a self, id: &'a str, cancel: CancellationToken) -> RunnerFuture<'a>;
}

pub struct Executor {
    store: Arc<dyn ExperimentStore>,
    cluster: Arc<dyn ClusterClient>,
    metrics: Arc<Metrics>,
    deadline_grace: Duration,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("cluster", &self.cluster)
            .field("deadline_grace", &self.deadline_grace)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(
        store: Arc<dyn ExperimentStore>,
        cluster: Arc<dyn ClusterClient>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cluster,
            metrics,
            deadline_grace: DEFAULT_DEADLINE_GRACE,
        }
    }

    pub fn with_deadline_grace(mut self, grace: Duration) -> Self {
        self.deadline_grace = grace;
        self
    }

    pub async fn execute_experiment(&self, id: &str) -> Result<ExperimentResult> {
        self.execute_experiment_with_cancel(id, CancellationToken::new())
            .await
    }

    /// Run experiment `id` to completion.
    ///
    /// Once the record is `Running`, every exit path writes a terminal
    /// status: `Completed` on success, `Cancelled` when `cancel` fired,
    /// `Failed` otherwise.
    pub async fn execute_experiment_with_cancel(
        &self,
        id: &str,
        cancel: CancellationToken,
    ) -> Result<ExperimentResult> {
        let experiment = self.store.get(id).await?;
        self.store
            .update_status(id, ExperimentStatus::Running)
            .await?;

        let _active = self.metrics.track_active();
        self.metrics.experiments_executed.inc();
        let started = Instant::now();
        info!(experiment = %id, fault = %experiment.fault_type, "executing experiment");

        let outcome = self.dispatch(&experiment, &cancel).await;

        let status = match &outcome {
            Ok(_) => ExperimentStatus::Completed,
            Err(ChaosError::Cancelled) if cancel.is_cancelled() => ExperimentStatus::Cancelled,
            Err(_) => ExperimentStatus::Failed,
        };
        if let Err(err) = self.store.update_status(id, status).await {
            warn!(experiment = %id, status = %status, error = %err, "failed to record terminal status");
        }

        self.metrics
            .experiment_duration
            .observe(started.elapsed().as_secs_f64());
        match &outcome {
            Ok(result) => {
                self.metrics.record_outcome(true);
                self.metrics
                    .targets_affected
                    .inc_by(result.affected_resources.len() as u64);
                info!(
                    experiment = %id,
                    duration = result.duration,
                    affected = result.affected_resources.len(),
                    "experiment completed"
                );
            }
            Err(err) => {
                if status == ExperimentStatus::Failed {
                    self.metrics.record_outcome(false);
                }
                warn!(experiment = %id, status = %status, error = %err, "experiment did not complete");
            }
        }

        outcome
    }

    async fn dispatch(
        &self,
        experiment: &Experiment,
        cancel: &CancellationToken,
    ) -> Result<ExperimentResult> {
        let duration = experiment.checked_duration()?;
        let fault = experiment.fault_type()?;
        if !(fault == FaultType::PodFailure || fault.is_simulated()) {
            return Err(ChaosError::UnsupportedType(fault.to_string()));
        }
        let params = extract_params(fault, &experiment.parameters)?;

        let deadline = cancel.child_token();
        let _deadline_guard = deadline.clone().drop_guard();
        spawn_deadline(
            &experiment.id,
            deadline.clone(),
            duration.saturating_add(self.deadline_grace),
        );

        match fault {
            FaultType::PodFailure => {
                run_pod_failure(
                    &experiment.id,
                    self.cluster.as_ref(),
                    &params,
                    duration,
                    &deadline,
                )
                .await
            }
            fault => run_simulated(&experiment.id, fault, &params, duration, &deadline).await,
        }
    }
}

/// Cancel `deadline` after `limit`, unless it is cancelled first.
fn spawn_deadline(id: &str, deadline: CancellationToken, limit: Duration) {
    let id = id.to_string();
    tokio::spawn(async move {
        tokio::select! {
            _ = deadline.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                debug!(experiment = %id, ?limit, "experiment deadline reached");
                deadline.cancel();
            }
        }
    });
}

impl ExperimentRunner for Executor {
    fn run_experiment<'a>(&'a self, id: &'a str, cancel: CancellationToken) -> RunnerFuture<'a> {
        Box::pin(self.execute_experiment_with_cancel(id, cancel))
    }
}
