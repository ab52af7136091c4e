// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ChaosError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ChaosError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_intervals(cfg)?;
    validate_experiments(cfg)?;
    validate_schedules(cfg)?;
    Ok(())
}

fn validate_intervals(cfg: &RawConfigFile) -> Result<()> {
    if cfg.operator.reconcile_interval_secs == 0 {
        return Err(ChaosError::Config(
            "[operator].reconcile_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.tick_interval_secs == 0 {
        return Err(ChaosError::Config(
            "[scheduler].tick_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.external.request_timeout_secs == 0 {
        return Err(ChaosError::Config(
            "[external].request_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_experiments(cfg: &RawConfigFile) -> Result<()> {
    for (id, entry) in cfg.experiment.iter() {
        if entry.duration == 0 {
            return Err(ChaosError::Config(format!(
                "[experiment.{id}].duration must be greater than 0"
            )));
        }
        let config = entry.to_config(id);
        config
            .validate()
            .map_err(|err| ChaosError::Config(format!("[experiment.{id}]: {err}")))?;
        if config.is_external() && config.target.trim().is_empty() {
            return Err(ChaosError::Config(format!(
                "[experiment.{id}] is external but has no target URL"
            )));
        }
    }
    Ok(())
}

fn validate_schedules(cfg: &RawConfigFile) -> Result<()> {
    for (id, entry) in cfg.schedule.iter() {
        if !cfg.experiment.contains_key(&entry.experiment) {
            return Err(ChaosError::Config(format!(
                "[schedule.{id}] references unknown experiment '{}'",
                entry.experiment
            )));
        }
        entry
            .to_schedule(id)
            .validate()
            .map_err(|err| ChaosError::Config(format!("[schedule.{id}]: {err}")))?;
    }
    Ok(())
}
