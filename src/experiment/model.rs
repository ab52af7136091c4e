// src/experiment/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ChaosError, Result};
use crate::types::{ExperimentStatus, FaultType};

/// Parameter key selecting the external controller.
pub const TARGET_TYPE_PARAM: &str = "target_type";

/// Longest duration a run request may carry; stored records hold an `i64`.
pub const MAX_DURATION_SECS: u64 = i64::MAX as u64;

/// Persisted experiment record, as owned by the storage collaborator.
///
/// `fault_type` is kept as the raw stored string so that an empty type and
/// an unknown type can be told apart when the experiment is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub fault_type: String,
    pub status: ExperimentStatus,
    pub target: String,
    pub parameters: BTreeMap<String, String>,
    /// Duration in seconds.
    pub duration: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(id: impl Into<String>, fault_type: FaultType, duration: i64) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            name: id.clone(),
            id,
            fault_type: fault_type.to_string(),
            status: ExperimentStatus::Pending,
            target: String::new(),
            parameters: BTreeMap::new(),
            duration,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve the stored type string.
    ///
    /// An empty string is `MissingType`; anything that does not name a known
    /// fault is `UnsupportedType`.
    pub fn fault_type(&self) -> Result<FaultType> {
        let raw = self.fault_type.trim();
        if raw.is_empty() {
            return Err(ChaosError::MissingType);
        }
        raw.parse()
            .map_err(|_| ChaosError::UnsupportedType(raw.to_string()))
    }

    /// The declared duration, rejecting non-positive values.
    pub fn checked_duration(&self) -> Result<Duration> {
        if self.duration <= 0 {
            return Err(ChaosError::InvalidDuration(self.duration));
        }
        Ok(Duration::from_secs(self.duration as u64))
    }
}

/// Caller-supplied execution request for the operator.
///
/// Built fresh for every run and never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub id: String,
    pub fault_type: FaultType,
    pub target: String,
    pub params: BTreeMap<String, String>,
    /// Duration in seconds.
    pub duration: u64,
}

impl ExperimentConfig {
    pub fn new(id: impl Into<String>, fault_type: FaultType, duration: u64) -> Self {
        Self {
            id: id.into(),
            fault_type,
            target: String::new(),
            params: BTreeMap::new(),
            duration,
        }
    }

    /// `true` when the `target_type = "external"` flag is set.
    pub fn is_external(&self) -> bool {
        self.params
            .get(TARGET_TYPE_PARAM)
            .is_some_and(|v| v == "external")
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Basic shape checks done before any controller is built.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ChaosError::Config(
                "experiment config must have a non-empty id".to_string(),
            ));
        }
        if self.duration == 0 {
            return Err(ChaosError::InvalidDuration(0));
        }
        if self.duration > MAX_DURATION_SECS {
            return Err(ChaosError::Config(format!(
                "experiment {} duration {}s exceeds the maximum of {MAX_DURATION_SECS}s",
                self.id, self.duration
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }
}

impl TryFrom<&ExperimentConfig> for Experiment {
    type Error = ChaosError;

    fn try_from(cfg: &ExperimentConfig) -> Result<Self> {
        let duration = i64::try_from(cfg.duration).map_err(|_| {
            ChaosError::Config(format!(
                "experiment {} duration {}s does not fit a stored record",
                cfg.id, cfg.duration
            ))
        })?;
        let mut experiment = Experiment::new(cfg.id.clone(), cfg.fault_type, duration);
        experiment.target = cfg.target.clone();
        experiment.parameters = cfg.params.clone();
        Ok(experiment)
    }
}
