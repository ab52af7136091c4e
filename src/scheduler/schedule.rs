// src/scheduler/schedule.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ChaosError, Result};
use crate::types::ScheduleKind;

/// When an experiment should be run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub experiment_id: String,
    pub kind: ScheduleKind,
    pub cron_expression: Option<String>,
    pub execute_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn one_time(
        id: impl Into<String>,
        experiment_id: impl Into<String>,
        execute_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            experiment_id: experiment_id.into(),
            kind: ScheduleKind::OneTime,
            cron_expression: None,
            execute_at: Some(execute_at),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn cron(
        id: impl Into<String>,
        experiment_id: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            experiment_id: experiment_id.into(),
            kind: ScheduleKind::Cron,
            cron_expression: Some(expression.into()),
            execute_at: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shape checks applied when a schedule is added.
    ///
    /// One-time schedules need `execute_at`; cron schedules need an
    /// expression the `cron` crate accepts (seconds field included).
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ChaosError::Config("schedule id cannot be empty".to_string()));
        }
        if self.experiment_id.trim().is_empty() {
            return Err(ChaosError::Config(format!(
                "schedule {} does not reference an experiment",
                self.id
            )));
        }

        match self.kind {
            ScheduleKind::OneTime => {
                if self.execute_at.is_none() {
                    return Err(ChaosError::Config(format!(
                        "one-time schedule {} needs execute_at",
                        self.id
                    )));
                }
            }
            ScheduleKind::Cron => {
                self.parsed_cron()?;
            }
        }
        Ok(())
    }

    fn parsed_cron(&self) -> Result<cron::Schedule> {
        let expr = self
            .cron_expression
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ChaosError::Config(format!("cron schedule {} needs an expression", self.id))
            })?;
        cron::Schedule::from_str(expr).map_err(|err| {
            ChaosError::Config(format!(
                "schedule {} has invalid cron expression '{expr}': {err}",
                self.id
            ))
        })
    }

    /// Whether a tick at `now` should fire this schedule.
    ///
    /// Cron schedules are never due: expression matching is not supported.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.kind {
            ScheduleKind::OneTime => self.execute_at.is_some_and(|at| at <= now),
            ScheduleKind::Cron => false,
        }
    }

    /// Next time the cron expression matches after `now`, for display only.
    pub fn next_cron_occurrence(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.kind != ScheduleKind::Cron {
            return None;
        }
        self.parsed_cron().ok()?.after(&now).next()
    }
}
