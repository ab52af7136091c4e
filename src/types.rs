use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of fault an experiment injects.
///
/// Only the first four kinds have an algorithm behind them; the others are
/// recognised (so they can be stored and listed) but rejected when an
/// experiment of that kind is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultType {
    PodFailure,
    NetworkDelay,
    CpuStress,
    MemoryStress,
    DiskFailure,
    ServiceFailure,
    ExternalTarget,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultType::PodFailure => "pod-failure",
            FaultType::NetworkDelay => "network-delay",
            FaultType::CpuStress => "cpu-stress",
            FaultType::MemoryStress => "memory-stress",
            FaultType::DiskFailure => "disk-failure",
            FaultType::ServiceFailure => "service-failure",
            FaultType::ExternalTarget => "external-target",
        }
    }

    /// Whether the fault is only simulated by waiting out the duration.
    ///
    /// No resource is perturbed for these kinds; they are extension points.
    pub fn is_simulated(&self) -> bool {
        matches!(
            self,
            FaultType::NetworkDelay | FaultType::CpuStress | FaultType::MemoryStress
        )
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pod-failure" => Ok(FaultType::PodFailure),
            "network-delay" => Ok(FaultType::NetworkDelay),
            "cpu-stress" => Ok(FaultType::CpuStress),
            "memory-stress" => Ok(FaultType::MemoryStress),
            "disk-failure" => Ok(FaultType::DiskFailure),
            "service-failure" => Ok(FaultType::ServiceFailure),
            "external-target" => Ok(FaultType::ExternalTarget),
            other => Err(format!("unknown fault type: {other}")),
        }
    }
}

/// Lifecycle status of an experiment.
///
/// ```text
/// Pending -> Running -> { Completed, Failed, Cancelled, Stopped }
/// ```
///
/// `Stopped` is what the external controller reports when a stop request
/// wins the race against its completion timer; the cluster controller uses
/// `Cancelled` for the same situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Stopped,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Failed => "failed",
            ExperimentStatus::Cancelled => "cancelled",
            ExperimentStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExperimentStatus::Pending | ExperimentStatus::Running)
    }

    fn rank(&self) -> u8 {
        match self {
            ExperimentStatus::Pending => 0,
            ExperimentStatus::Running => 1,
            _ => 2,
        }
    }

    /// Status only ever moves forward; a terminal status is final.
    pub fn can_transition_to(&self, next: ExperimentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl Default for ExperimentStatus {
    fn default() -> Self {
        ExperimentStatus::Pending
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ExperimentStatus::Pending),
            "running" => Ok(ExperimentStatus::Running),
            "completed" => Ok(ExperimentStatus::Completed),
            "failed" => Ok(ExperimentStatus::Failed),
            "cancelled" => Ok(ExperimentStatus::Cancelled),
            "stopped" => Ok(ExperimentStatus::Stopped),
            other => Err(format!("unknown experiment status: {other}")),
        }
    }
}

/// How a schedule decides when to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleKind {
    /// Fire once, at or after `execute_at`, then disable.
    OneTime,
    /// Accepted and validated, never fired.
    Cron,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::OneTime => f.write_str("one-time"),
            ScheduleKind::Cron => f.write_str("cron"),
        }
    }
}
