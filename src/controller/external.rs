// src/controller/external.rs

//! Controller driving a remote service's fault-injection HTTP contract.
//!
//! ```text
//! POST <target><endpoint>          inject   (200 / 202 expected)
//!   ... wait for duration or stop ...
//! POST <target><cleanup_endpoint>  cleanup  (always sent)
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use tracing::{error, info, warn};

use crate::errors::{ChaosError, Result};
use crate::experiment::ExperimentConfig;
use crate::types::ExperimentStatus;

use super::state::ControllerState;

pub const EXPERIMENT_ID_HEADER: &str = "X-Chaos-Experiment-ID";
pub const EXPERIMENT_TYPE_HEADER: &str = "X-Chaos-Experiment-Type";
pub const EXPERIMENT_DURATION_HEADER: &str = "X-Chaos-Experiment-Duration";

const DEFAULT_CLEANUP_PATH: &str = "/cleanup";

#[derive(Debug)]
pub struct ExternalController {
    id: String,
    target: String,
    fault_label: String,
    params: BTreeMap<String, String>,
    duration: Duration,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl ExternalController {
    pub fn new(
        config: &ExperimentConfig,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Result<Self> {
        let target = config.target.trim();
        if target.is_empty() {
            return Err(ChaosError::ControllerCreation(format!(
                "external experiment {} has no target URL",
                config.id
            )));
        }
        Url::parse(target).map_err(|err| {
            ChaosError::ControllerCreation(format!("invalid target URL '{target}': {err}"))
        })?;

        let fault_label = config
            .param("type")
            .map(str::to_string)
            .unwrap_or_else(|| config.fault_type.to_string());

        Ok(Self {
            id: config.id.clone(),
            target: target.to_string(),
            fault_label,
            params: config.params.clone(),
            duration: config.duration(),
            http,
            request_timeout,
        })
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// `<target><path>`, concatenated as given.
    fn url_with(&self, path: Option<&str>) -> String {
        format!("{}{}", self.target, path.unwrap_or_default())
    }

    pub fn inject_url(&self) -> String {
        self.url_with(self.param("endpoint"))
    }

    pub fn cleanup_url(&self) -> String {
        self.url_with(Some(self.param("cleanup_endpoint").unwrap_or(DEFAULT_CLEANUP_PATH)))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(EXPERIMENT_ID_HEADER, &self.id);
        match self.param("auth_token") {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn inject(&self) -> Result<()> {
        let url = self.inject_url();
        let response = self
            .post(&url)
            .header(EXPERIMENT_TYPE_HEADER, &self.fault_label)
            .header(EXPERIMENT_DURATION_HEADER, self.duration.as_secs().to_string())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            other => Err(ChaosError::Network(format!(
                "inject request to {url} returned unexpected status code: {other}"
            ))),
        }
    }

    async fn cleanup(&self) -> Result<()> {
        let url = self.cleanup_url();
        let response = self.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(ChaosError::Network(format!(
                "cleanup request to {url} returned status code: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn cleanup_logged(&self) {
        match self.cleanup().await {
            Ok(()) => info!(experiment = %self.id, "external experiment cleaned up"),
            Err(err) => {
                warn!(experiment = %self.id, error = %err, "error cleaning up external experiment")
            }
        }
    }

    /// Inject, hold until the timer or a stop fires, then clean up.
    pub(crate) async fn run(&self, state: &ControllerState) -> ExperimentStatus {
        let cancel = state.cancel_token();
        info!(experiment = %self.id, target = %self.target, "starting external experiment");

        if let Err(err) = self.inject().await {
            error!(experiment = %self.id, error = %err, "error executing external experiment");
            self.cleanup_logged().await;
            return ExperimentStatus::Failed;
        }

        let status = tokio::select! {
            _ = tokio::time::sleep(self.duration) => {
                info!(experiment = %self.id, "external experiment completed");
                ExperimentStatus::Completed
            }
            _ = cancel.cancelled() => {
                info!(experiment = %self.id, "external experiment was stopped");
                ExperimentStatus::Stopped
            }
        };

        self.cleanup_logged().await;
        status
    }
}
