// src/errors.rs

//! Crate-wide error type.

use thiserror::Error;

use crate::types::ExperimentStatus;

#[derive(Error, Debug)]
pub enum ChaosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("experiment {0} is already running")]
    DuplicateExperiment(String),

    #[error("failed to create experiment controller: {0}")]
    ControllerCreation(String),

    #[error("experiment type cannot be empty")]
    MissingType,

    #[error("unsupported experiment type: {0}")]
    UnsupportedType(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid experiment duration: {0}, must be greater than 0")]
    InvalidDuration(i64),

    #[error("no targets found matching selector '{selector}' in namespace '{namespace}'")]
    NoMatchingTargets { namespace: String, selector: String },

    #[error("none of the {attempted} selected targets could be deleted")]
    TargetDeletionFailed { attempted: usize },

    #[error("network error: {0}")]
    Network(String),

    #[error("experiment {0} not found")]
    ExperimentNotFound(String),

    #[error("schedule {0} not found")]
    ScheduleNotFound(String),

    #[error("experiment cancelled")]
    Cancelled,

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ExperimentStatus,
        to: ExperimentStatus,
    },

    #[error("cluster error: {0}")]
    Cluster(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ChaosError {
    fn from(err: reqwest::Error) -> Self {
        ChaosError::Network(err.to_string())
    }
}

impl From<kube::Error> for ChaosError {
    fn from(err: kube::Error) -> Self {
        ChaosError::Cluster(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChaosError>;
