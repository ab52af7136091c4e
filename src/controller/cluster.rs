// src/controller/cluster.rs

//! Controller for experiments against cluster-managed targets.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cluster::ClusterClient;
use crate::errors::{ChaosError, Result};
use crate::experiment::{
    ExperimentConfig, FaultParams, extract_params, run_pod_failure, run_simulated,
};
use crate::metrics::Metrics;
use crate::types::{ExperimentStatus, FaultType};

use super::state::ControllerState;

#[derive(Debug)]
pub struct ClusterController {
    id: String,
    fault: FaultType,
    params: FaultParams,
    duration: Duration,
    cluster: Arc<dyn ClusterClient>,
}

impl ClusterController {
    /// Validate the config and resolve parameters.
    ///
    /// Unsupported fault kinds and missing `namespace` / `selector` are
    /// rejected here, before any task is spawned or target contacted.
    pub fn new(config: &ExperimentConfig, cluster: Arc<dyn ClusterClient>) -> Result<Self> {
        let fault = config.fault_type;
        if !(fault == FaultType::PodFailure || fault.is_simulated()) {
            return Err(ChaosError::UnsupportedType(fault.to_string()));
        }
        let params = extract_params(fault, &config.params)?;

        Ok(Self {
            id: config.id.clone(),
            fault,
            params,
            duration: config.duration(),
            cluster,
        })
    }

    /// Run the fault to completion and report the terminal status.
    pub(crate) async fn run(&self, state: &ControllerState, metrics: &Metrics) -> ExperimentStatus {
        let cancel = state.cancel_token();
        info!(experiment = %self.id, fault = %self.fault, "executing cluster experiment");

        let outcome = match self.fault {
            FaultType::PodFailure => {
                run_pod_failure(
                    &self.id,
                    self.cluster.as_ref(),
                    &self.params,
                    self.duration,
                    &cancel,
                )
                .await
            }
            fault => run_simulated(&self.id, fault, &self.params, self.duration, &cancel).await,
        };

        match outcome {
            Ok(result) => {
                metrics
                    .targets_affected
                    .inc_by(result.affected_resources.len() as u64);
                ExperimentStatus::Completed
            }
            Err(ChaosError::Cancelled) => ExperimentStatus::Cancelled,
            Err(err) => {
                warn!(experiment = %self.id, error = %err, "experiment failed");
                ExperimentStatus::Failed
            }
        }
    }
}
