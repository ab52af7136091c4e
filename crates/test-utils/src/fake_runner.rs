use std::sync::{Arc, Mutex};
use std::time::Duration;

use chaos_operator::errors::ChaosError;
use chaos_operator::executor::{ExperimentRunner, RunnerFuture};
use chaos_operator::experiment::ExperimentResult;
use chaos_operator::types::FaultType;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A fake runner that:
/// - records which experiment ids were run, in call order
/// - optionally holds each run for `delay` (cancellable)
/// - succeeds, unless the id was registered with [`FakeRunner::fail`].
#[derive(Clone, Default)]
pub struct FakeRunner {
    invocations: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().push(id.to_string());
    }

    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count_for(&self, id: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.as_str() == id)
            .count()
    }
}

impl ExperimentRunner for FakeRunner {
    fn run_experiment<'a>(&'a self, id: &'a str, cancel: CancellationToken) -> RunnerFuture<'a> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(id.to_string());
            debug!(experiment = %id, delay = ?self.delay, "fake runner invoked");

            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ChaosError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if self.failing.lock().unwrap().iter().any(|f| f == id) {
                return Err(ChaosError::Network(format!("fake failure for {id}")));
            }

            let mut result = ExperimentResult::begin(id, FaultType::PodFailure);
            result.finish(true);
            Ok(result)
        })
    }
}
