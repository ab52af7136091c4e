#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chaos_operator::cluster::mock::MockCluster;
use chaos_operator::controller::{Controller, ControllerDeps};
use chaos_operator::metrics::Metrics;
use chaos_operator::operator::{Operator, OperatorSettings};
use chaos_operator::types::ExperimentStatus;

pub use chaos_operator_test_utils::builders;
pub use chaos_operator_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// A mock cluster with `count` targets `web-0..` labelled `app=web` in
/// `default`, plus one unrelated `db-0`.
pub fn web_cluster(count: usize) -> MockCluster {
    let cluster = MockCluster::new();
    for i in 0..count {
        cluster.add_target("default", &format!("web-{i}"), &[("app", "web")]);
    }
    cluster.add_target("default", "db-0", &[("app", "db")]);
    cluster
}

pub fn metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().unwrap())
}

pub fn deps(cluster: &MockCluster, metrics: &Arc<Metrics>) -> ControllerDeps {
    ControllerDeps {
        cluster: Arc::new(cluster.clone()),
        metrics: metrics.clone(),
        http: reqwest::Client::new(),
        request_timeout: Duration::from_secs(2),
    }
}

pub fn operator(cluster: &MockCluster, metrics: &Arc<Metrics>) -> Operator {
    let settings = OperatorSettings {
        reconcile_interval: Duration::from_secs(10),
        request_timeout: Duration::from_secs(2),
    };
    Operator::new(Arc::new(cluster.clone()), metrics.clone(), settings).unwrap()
}

/// Poll until the controller's background task has exited.
pub async fn wait_finished(controller: &Controller) -> ExperimentStatus {
    with_timeout(async {
        while !controller.is_done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    controller.status()
}

/// Poll the operator until `id` reaches a terminal status.
pub async fn wait_terminal(operator: &Operator, id: &str) -> ExperimentStatus {
    with_timeout(async {
        loop {
            let status = operator.get_experiment_status(id).unwrap();
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
