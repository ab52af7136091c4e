// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::Result;
use crate::experiment::{Experiment, ExperimentConfig};
use crate::operator::OperatorSettings;
use crate::scheduler::Schedule;
use crate::types::{FaultType, ScheduleKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [operator]
/// reconcile_interval_secs = 10
///
/// [cluster]
/// mock = true
///
/// [experiment.web-pods]
/// type = "pod-failure"
/// duration = 30
/// params = { namespace = "default", selector = "app=web", percentage = "50" }
///
/// [schedule.nightly]
/// experiment = "web-pods"
/// execute_at = "2026-01-01T00:00:00Z"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub operator: OperatorSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub external: ExternalSection,

    /// All experiments from `[experiment.<id>]`, keyed by id.
    #[serde(default)]
    pub experiment: BTreeMap<String, ExperimentEntry>,

    /// All schedules from `[schedule.<id>]`, keyed by id.
    #[serde(default)]
    pub schedule: BTreeMap<String, ScheduleEntry>,
}

/// Validated configuration. Built from [`RawConfigFile`] via `TryFrom`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub operator: OperatorSection,
    pub scheduler: SchedulerSection,
    pub cluster: ClusterSection,
    pub external: ExternalSection,
    pub experiment: BTreeMap<String, ExperimentEntry>,
    pub schedule: BTreeMap<String, ScheduleEntry>,
}

/// `[operator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorSection {
    /// Seconds between reconcile passes.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_reconcile_interval_secs() -> u64 {
    10
}

impl Default for OperatorSection {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterSection {
    /// Use the in-memory cluster instead of connecting to Kubernetes.
    #[serde(default)]
    pub mock: bool,
}

/// `[external]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalSection {
    /// Per-call timeout for inject and cleanup requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ExternalSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// `[experiment.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentEntry {
    #[serde(rename = "type")]
    pub fault_type: FaultType,

    /// Label selector or, for external experiments, the target base URL.
    #[serde(default)]
    pub target: String,

    /// Seconds; must be greater than zero.
    pub duration: u64,

    /// Whether the reconcile loop keeps this experiment running.
    #[serde(default = "default_managed")]
    pub managed: bool,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_managed() -> bool {
    true
}

/// `[schedule.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntry {
    /// Id of an `[experiment.<id>]` section.
    pub experiment: String,

    #[serde(rename = "type", default = "default_schedule_kind")]
    pub kind: ScheduleKind,

    /// RFC 3339 timestamp, required for one-time schedules.
    #[serde(default)]
    pub execute_at: Option<DateTime<Utc>>,

    /// Cron expression with a seconds field, required for cron schedules.
    #[serde(default)]
    pub cron: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_schedule_kind() -> ScheduleKind {
    ScheduleKind::OneTime
}

fn default_enabled() -> bool {
    true
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            operator: raw.operator,
            scheduler: raw.scheduler,
            cluster: raw.cluster,
            external: raw.external,
            experiment: raw.experiment,
            schedule: raw.schedule,
        }
    }

    /// Every declared experiment as a run request, in id order.
    pub fn experiment_configs(&self) -> Vec<ExperimentConfig> {
        self.experiment
            .iter()
            .map(|(id, entry)| entry.to_config(id))
            .collect()
    }

    /// Only the `managed = true` experiments: the reconcile desired state.
    pub fn desired_experiments(&self) -> Vec<ExperimentConfig> {
        self.experiment
            .iter()
            .filter(|(_, entry)| entry.managed)
            .map(|(id, entry)| entry.to_config(id))
            .collect()
    }

    /// Pending store records for every declared experiment.
    pub fn experiments(&self) -> Result<Vec<Experiment>> {
        self.experiment_configs()
            .iter()
            .map(Experiment::try_from)
            .collect()
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.schedule
            .iter()
            .map(|(id, entry)| entry.to_schedule(id))
            .collect()
    }

    pub fn operator_settings(&self) -> OperatorSettings {
        OperatorSettings {
            reconcile_interval: Duration::from_secs(self.operator.reconcile_interval_secs),
            request_timeout: Duration::from_secs(self.external.request_timeout_secs),
        }
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }
}

impl ExperimentEntry {
    pub fn to_config(&self, id: &str) -> ExperimentConfig {
        let mut config = ExperimentConfig::new(id, self.fault_type, self.duration);
        config.target = self.target.clone();
        config.params = self.params.clone();
        config
    }
}

impl ScheduleEntry {
    pub fn to_schedule(&self, id: &str) -> Schedule {
        let mut schedule = match self.kind {
            ScheduleKind::OneTime => {
                let mut s = Schedule::one_time(id, &self.experiment, Utc::now());
                s.execute_at = self.execute_at;
                s
            }
            ScheduleKind::Cron => {
                Schedule::cron(id, &self.experiment, self.cron.clone().unwrap_or_default())
            }
        };
        schedule.enabled = self.enabled;
        schedule
    }
}
