// src/experiment/simulated.rs

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{ChaosError, Result};
use crate::experiment::params::FaultParams;
use crate::experiment::result::ExperimentResult;
use crate::experiment::wait::{WaitOutcome, wait_for};
use crate::types::FaultType;

/// Network delay, CPU stress and memory stress.
///
/// Nothing is perturbed: the run waits out the duration and completes.
/// Real fault mechanics plug in here.
pub async fn run_simulated(
    experiment_id: &str,
    fault: FaultType,
    params: &FaultParams,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<ExperimentResult> {
    let mut result = ExperimentResult::begin(experiment_id, fault);
    result.record_metric(params.value_name, params.value as f64);

    info!(
        experiment = %experiment_id,
        fault = %fault,
        namespace = %params.namespace,
        selector = %params.selector,
        value = params.value,
        unit = params.unit,
        "simulating fault"
    );

    match wait_for(duration, cancel).await {
        WaitOutcome::Elapsed => {
            result.finish(true);
            info!(experiment = %experiment_id, fault = %fault, "simulated fault completed");
            Ok(result)
        }
        WaitOutcome::Cancelled => {
            info!(experiment = %experiment_id, fault = %fault, "simulated fault cancelled");
            Err(ChaosError::Cancelled)
        }
    }
}
