#![allow(dead_code)]

use std::collections::BTreeMap;

use chaos_operator::experiment::{Experiment, ExperimentConfig};
use chaos_operator::scheduler::Schedule;
use chaos_operator::types::{ExperimentStatus, FaultType};
use chrono::{DateTime, Utc};

/// Builder for `ExperimentConfig` to simplify test setup.
///
/// Defaults to a 1-second pod-failure against `default` / `app=web`.
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    pub fn new(id: &str) -> Self {
        let mut config = ExperimentConfig::new(id, FaultType::PodFailure, 1);
        config.params = cluster_params("default", "app=web");
        Self { config }
    }

    /// An external experiment against `target`, with no cluster params.
    pub fn external(id: &str, target: &str) -> Self {
        let mut config = ExperimentConfig::new(id, FaultType::ExternalTarget, 1);
        config.target = target.to_string();
        config
            .params
            .insert("target_type".to_string(), "external".to_string());
        Self { config }
    }

    pub fn fault(mut self, fault: FaultType) -> Self {
        self.config.fault_type = fault;
        self
    }

    pub fn duration(mut self, secs: u64) -> Self {
        self.config.duration = secs;
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.config.target = target.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.config
            .params
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn without_param(mut self, key: &str) -> Self {
        self.config.params.remove(key);
        self
    }

    pub fn build(self) -> ExperimentConfig {
        self.config
    }
}

/// Builder for stored `Experiment` records.
pub struct ExperimentBuilder {
    experiment: Experiment,
}

impl ExperimentBuilder {
    pub fn new(id: &str) -> Self {
        let mut experiment = Experiment::new(id, FaultType::PodFailure, 1);
        experiment.parameters = cluster_params("default", "app=web");
        Self { experiment }
    }

    pub fn fault(mut self, fault: FaultType) -> Self {
        self.experiment.fault_type = fault.to_string();
        self
    }

    /// Store a raw type string, e.g. `""` or an unknown kind.
    pub fn raw_type(mut self, raw: &str) -> Self {
        self.experiment.fault_type = raw.to_string();
        self
    }

    pub fn duration(mut self, secs: i64) -> Self {
        self.experiment.duration = secs;
        self
    }

    pub fn status(mut self, status: ExperimentStatus) -> Self {
        self.experiment.status = status;
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.experiment
            .parameters
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn without_param(mut self, key: &str) -> Self {
        self.experiment.parameters.remove(key);
        self
    }

    pub fn build(self) -> Experiment {
        self.experiment
    }
}

/// Builder for `Schedule`.
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    pub fn one_time(id: &str, experiment_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            schedule: Schedule::one_time(id, experiment_id, at),
        }
    }

    pub fn cron(id: &str, experiment_id: &str, expression: &str) -> Self {
        Self {
            schedule: Schedule::cron(id, experiment_id, expression),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.schedule.enabled = false;
        self
    }

    pub fn build(self) -> Schedule {
        self.schedule
    }
}

pub fn cluster_params(namespace: &str, selector: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("namespace".to_string(), namespace.to_string()),
        ("selector".to_string(), selector.to_string()),
    ])
}
