// src/controller/mod.rs

//! Experiment controllers.
//!
//! A [`Controller`] owns one running experiment. It wraps a
//! [`ControllerKind`] (the fault-specific behaviour) and a shared
//! [`ControllerState`] (status, stop signal, done signal):
//!
//! ```text
//!   start()  -> Pending -> Running, spawns the background task
//!   task     -> runs the kind, writes the terminal status, marks done
//!   stop()   -> signals once, waits for done, reports Cancelled / Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cluster::ClusterClient;
use crate::errors::{ChaosError, Result};
use crate::experiment::ExperimentConfig;
use crate::metrics::Metrics;
use crate::types::ExperimentStatus;

pub mod cluster;
pub mod external;
pub mod state;

pub use cluster::ClusterController;
pub use external::ExternalController;
pub use state::ControllerState;

use state::DoneGuard;

/// Collaborators handed to every controller the operator builds.
#[derive(Debug, Clone)]
pub struct ControllerDeps {
    pub cluster: Arc<dyn ClusterClient>,
    pub metrics: Arc<Metrics>,
    pub http: reqwest::Client,
    pub request_timeout: Duration,
}

/// The closed set of controller behaviours.
#[derive(Debug)]
pub enum ControllerKind {
    Cluster(ClusterController),
    External(ExternalController),
}

impl ControllerKind {
    /// Status reported when a stop request ends the experiment early.
    pub fn stopped_status(&self) -> ExperimentStatus {
        match self {
            ControllerKind::Cluster(_) => ExperimentStatus::Cancelled,
            ControllerKind::External(_) => ExperimentStatus::Stopped,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ControllerKind::Cluster(_) => "cluster",
            ControllerKind::External(_) => "external",
        }
    }

    async fn run(&self, state: &ControllerState, metrics: &Metrics) -> ExperimentStatus {
        match self {
            ControllerKind::Cluster(c) => c.run(state, metrics).await,
            ControllerKind::External(c) => c.run(state).await,
        }
    }
}

#[derive(Debug)]
pub struct Controller {
    state: Arc<ControllerState>,
    kind: Arc<ControllerKind>,
    metrics: Arc<Metrics>,
}

impl Controller {
    /// Pick and construct the controller for `config`.
    ///
    /// `target_type = "external"` selects the external controller; every
    /// other config goes to the cluster controller.
    pub fn build(config: &ExperimentConfig, deps: &ControllerDeps) -> Result<Self> {
        config.validate()?;

        let kind = if config.is_external() {
            ControllerKind::External(ExternalController::new(
                config,
                deps.http.clone(),
                deps.request_timeout,
            )?)
        } else {
            ControllerKind::Cluster(ClusterController::new(config, deps.cluster.clone())?)
        };
        debug!(experiment = %config.id, kind = kind.label(), "controller built");

        Ok(Self {
            state: Arc::new(ControllerState::new(config.id.clone())),
            kind: Arc::new(kind),
            metrics: deps.metrics.clone(),
        })
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn kind(&self) -> &ControllerKind {
        &self.kind
    }

    pub fn status(&self) -> ExperimentStatus {
        self.state.status()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Move to `Running` and launch the background task.
    ///
    /// Returns as soon as the task is spawned. A controller can be started
    /// at most once.
    pub fn start(&self) -> Result<()> {
        if !self.state.transition(ExperimentStatus::Running) {
            return Err(ChaosError::InvalidTransition {
                from: self.state.status(),
                to: ExperimentStatus::Running,
            });
        }

        let active = self.metrics.track_active();
        let state = self.state.clone();
        let kind = self.kind.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let _done = DoneGuard(&state);
            let _active = active;

            let outcome = kind.run(&state, &metrics).await;
            if state.transition(outcome) {
                info!(experiment = %state.id(), status = %outcome, "experiment finished");
                if matches!(
                    outcome,
                    ExperimentStatus::Completed | ExperimentStatus::Failed
                ) {
                    metrics.record_outcome(outcome == ExperimentStatus::Completed);
                }
            } else {
                debug!(
                    experiment = %state.id(),
                    status = %state.status(),
                    "terminal status already set"
                );
            }
        });

        Ok(())
    }

    /// Request a stop and wait for the background task to exit.
    ///
    /// Safe to call any number of times, before or after completion. When
    /// the experiment already finished on its own, its terminal status is
    /// left as it is.
    pub async fn stop(&self) -> Result<()> {
        let stopped = self.kind.stopped_status();

        if self
            .state
            .transition_from(ExperimentStatus::Pending, stopped)
        {
            self.state.request_stop();
            self.state.mark_done();
            info!(experiment = %self.id(), status = %stopped, "stopped before start");
            return Ok(());
        }

        if self.state.request_stop() {
            info!(experiment = %self.id(), "stop requested");
        }
        self.state.wait_done().await;

        // Covers a task that exited without writing a terminal status.
        self.state
            .transition_from(ExperimentStatus::Running, stopped);
        Ok(())
    }
}
