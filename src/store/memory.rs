// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::debug;

use super::{ExperimentStore, StoreFuture};
use crate::errors::ChaosError;
use crate::experiment::Experiment;
use crate::types::ExperimentStatus;

/// Experiment records kept in a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    experiments: RwLock<HashMap<String, Experiment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, experiment: Experiment) {
        self.experiments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(experiment.id.clone(), experiment);
    }

    /// All records, sorted by id.
    pub fn list(&self) -> Vec<Experiment> {
        let mut all: Vec<Experiment> = self
            .experiments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn status_of(&self, id: &str) -> Option<ExperimentStatus> {
        self.experiments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|e| e.status)
    }
}

impl ExperimentStore for InMemoryStore {
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Experiment> {
        Box::pin(async move {
            self.experiments
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(id)
                .cloned()
                .ok_or_else(|| ChaosError::ExperimentNotFound(id.to_string()))
        })
    }

    fn update_status<'a>(&'a self, id: &'a str, status: ExperimentStatus) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut experiments = self
                .experiments
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let experiment = experiments
                .get_mut(id)
                .ok_or_else(|| ChaosError::ExperimentNotFound(id.to_string()))?;

            if !experiment.status.can_transition_to(status) {
                return Err(ChaosError::InvalidTransition {
                    from: experiment.status,
                    to: status,
                });
            }

            debug!(experiment = %id, from = %experiment.status, to = %status, "status updated");
            experiment.status = status;
            experiment.updated_at = Utc::now();
            Ok(())
        })
    }
}
