// src/experiment/pod_failure.rs

//! Delete a percentage of the targets matching a label selector, then hold
//! the disruption for the experiment's duration.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cluster::ClusterClient;
use crate::errors::{ChaosError, Result};
use crate::experiment::params::FaultParams;
use crate::experiment::result::ExperimentResult;
use crate::experiment::wait::{WaitOutcome, wait_for};
use crate::types::FaultType;

/// Number of targets to delete out of `found` for the given percentage.
///
/// `max(1, min(found, floor(found * percentage / 100)))`, and zero when
/// nothing was found.
pub fn deletion_count(found: usize, percentage: u32) -> usize {
    if found == 0 {
        return 0;
    }
    let scaled = (found as u128 * percentage as u128 / 100) as usize;
    scaled.min(found).max(1)
}

/// Run the pod-failure algorithm.
///
/// Targets are deleted in listing order. A failed deletion is logged and
/// skipped; the run only fails when nothing matched or nothing could be
/// deleted. The disruption is then held for the full `duration`, counted
/// from the end of the deletion loop, and is cancellable through `cancel`.
pub async fn run_pod_failure(
    experiment_id: &str,
    cluster: &dyn ClusterClient,
    params: &FaultParams,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<ExperimentResult> {
    let mut result = ExperimentResult::begin(experiment_id, FaultType::PodFailure);

    info!(
        experiment = %experiment_id,
        namespace = %params.namespace,
        selector = %params.selector,
        percentage = params.value,
        "starting pod failure"
    );

    let targets = cluster
        .list_matching(&params.namespace, &params.selector)
        .await?;

    if targets.is_empty() {
        return Err(ChaosError::NoMatchingTargets {
            namespace: params.namespace.clone(),
            selector: params.selector.clone(),
        });
    }

    let count = deletion_count(targets.len(), params.value);
    result.record_metric("targets_found", targets.len() as f64);
    result.record_metric(params.value_name, params.value as f64);

    for name in targets.iter().take(count) {
        info!(experiment = %experiment_id, target = %name, "deleting target");
        match cluster.delete(&params.namespace, name).await {
            Ok(()) => result.affected_resources.push(name.clone()),
            Err(err) => {
                warn!(experiment = %experiment_id, target = %name, error = %err, "failed to delete target");
            }
        }
    }

    result.record_metric("targets_deleted", result.affected_resources.len() as f64);

    if result.affected_resources.is_empty() {
        return Err(ChaosError::TargetDeletionFailed { attempted: count });
    }

    match wait_for(duration, cancel).await {
        WaitOutcome::Elapsed => {
            result.finish(true);
            info!(
                experiment = %experiment_id,
                deleted = result.affected_resources.len(),
                "pod failure completed"
            );
            Ok(result)
        }
        WaitOutcome::Cancelled => {
            info!(
                experiment = %experiment_id,
                affected = ?result.affected_resources,
                "pod failure cancelled while holding disruption"
            );
            Err(ChaosError::Cancelled)
        }
    }
}
