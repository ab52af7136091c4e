// src/experiment/result.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::FaultType;

/// Outcome of one fault run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: String,
    pub experiment_id: String,
    pub experiment_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end; zero until `end_time` is set.
    pub duration: f64,
    pub success: bool,
    pub error: Option<String>,
    pub affected_resources: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}

impl ExperimentResult {
    /// Start a new result, stamped now.
    pub fn begin(experiment_id: &str, fault: FaultType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            experiment_id: experiment_id.to_string(),
            experiment_type: fault.to_string(),
            start_time: Utc::now(),
            end_time: None,
            duration: 0.0,
            success: false,
            error: None,
            affected_resources: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn finish(&mut self, success: bool) {
        self.end_time = Some(Utc::now());
        self.success = success;
        self.calculate_duration();
    }

    pub fn calculate_duration(&mut self) {
        if let Some(end) = self.end_time {
            self.duration = (end - self.start_time)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
        }
    }

    pub fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }
}
