// src/experiment/mod.rs

//! Experiment data model and the fault algorithms shared by the
//! controllers and the executor.
//!
//! - [`model`] holds the persisted `Experiment` record and the ephemeral
//!   `ExperimentConfig` a caller hands to the operator.
//! - [`params`] extracts `namespace` / `selector` and the per-fault numeric
//!   parameter from the opaque parameter map.
//! - [`result`] is the `ExperimentResult` produced by an algorithm.
//! - [`wait`] is the cooperatively cancellable "wait out the duration" step.
//! - [`pod_failure`] deletes a percentage of matching targets.
//! - [`simulated`] covers the fault kinds that only wait.

pub mod model;
pub mod params;
pub mod pod_failure;
pub mod result;
pub mod simulated;
pub mod wait;

pub use model::{Experiment, ExperimentConfig, MAX_DURATION_SECS};
pub use params::{FaultParams, extract_params};
pub use pod_failure::{deletion_count, run_pod_failure};
pub use result::ExperimentResult;
pub use simulated::run_simulated;
pub use wait::{WaitOutcome, wait_for};
