mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use tokio::net::TcpListener;

use chaos_operator::controller::external::{
    EXPERIMENT_DURATION_HEADER, EXPERIMENT_ID_HEADER, EXPERIMENT_TYPE_HEADER, ExternalController,
};
use chaos_operator::controller::{Controller, ControllerKind};
use chaos_operator::errors::ChaosError;
use chaos_operator::types::ExperimentStatus;

use crate::common::builders::ExperimentConfigBuilder;
use crate::common::{TestResult, deps, init_tracing, metrics, wait_finished, web_cluster};

#[derive(Debug, Clone)]
struct Request {
    path: String,
    id: Option<String>,
    fault: Option<String>,
    duration: Option<String>,
    auth: Option<String>,
}

/// Fake remote fault-injection service recording every call.
#[derive(Clone)]
struct FakeTarget {
    requests: Arc<Mutex<Vec<Request>>>,
    inject_status: Arc<AtomicU16>,
}

impl FakeTarget {
    fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            inject_status: Arc::new(AtomicU16::new(200)),
        }
    }

    fn respond_to_inject_with(&self, status: StatusCode) {
        self.inject_status.store(status.as_u16(), Ordering::SeqCst);
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    fn record(&self, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name.to_ascii_lowercase().as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Request {
            path: uri.path().to_string(),
            id: header(EXPERIMENT_ID_HEADER),
            fault: header(EXPERIMENT_TYPE_HEADER),
            duration: header(EXPERIMENT_DURATION_HEADER),
            auth: header("authorization"),
        });
    }
}

async fn inject(State(target): State<FakeTarget>, uri: Uri, headers: HeaderMap) -> StatusCode {
    target.record(&uri, &headers);
    StatusCode::from_u16(target.inject_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn cleanup(State(target): State<FakeTarget>, uri: Uri, headers: HeaderMap) -> StatusCode {
    target.record(&uri, &headers);
    StatusCode::OK
}

async fn serve(target: FakeTarget) -> SocketAddr {
    let app = Router::new()
        .route("/", post(inject))
        .route("/inject", post(inject))
        .route("/cleanup", post(cleanup))
        .route("/custom/cleanup", post(cleanup))
        .with_state(target);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn stop_wins_the_race_and_cleanup_is_still_sent() -> TestResult {
    init_tracing();
    let target = FakeTarget::new();
    let addr = serve(target.clone()).await;
    let cluster = web_cluster(0);
    let metrics = metrics();

    let config = ExperimentConfigBuilder::external("ext-stop", &format!("http://{addr}"))
        .duration(2)
        .build();
    let controller = Controller::build(&config, &deps(&cluster, &metrics))?;
    assert!(matches!(controller.kind(), ControllerKind::External(_)));

    controller.start()?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.stop().await?;

    assert_eq!(controller.status(), ExperimentStatus::Stopped);
    assert_eq!(target.paths(), vec!["/", "/cleanup"]);

    let requests = target.requests();
    let inject = &requests[0];
    assert_eq!(inject.id.as_deref(), Some("ext-stop"));
    assert_eq!(inject.fault.as_deref(), Some("external-target"));
    assert_eq!(inject.duration.as_deref(), Some("2"));
    assert_eq!(inject.auth, None);
    assert_eq!(requests[1].id.as_deref(), Some("ext-stop"));
    assert_eq!(metrics.active(), 0);
    Ok(())
}

#[tokio::test]
async fn timer_completes_the_experiment() -> TestResult {
    init_tracing();
    let target = FakeTarget::new();
    target.respond_to_inject_with(StatusCode::ACCEPTED);
    let addr = serve(target.clone()).await;
    let cluster = web_cluster(0);
    let metrics = metrics();

    let config = ExperimentConfigBuilder::external("ext-done", &format!("http://{addr}"))
        .param("endpoint", "/inject")
        .param("type", "latency")
        .duration(1)
        .build();
    let controller = Controller::build(&config, &deps(&cluster, &metrics))?;
    controller.start()?;

    assert_eq!(wait_finished(&controller).await, ExperimentStatus::Completed);
    assert_eq!(target.paths(), vec!["/inject", "/cleanup"]);
    assert_eq!(target.requests()[0].fault.as_deref(), Some("latency"));
    assert_eq!(metrics.experiments_succeeded.get(), 1);

    controller.stop().await?;
    assert_eq!(controller.status(), ExperimentStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn rejected_inject_fails_and_still_cleans_up() -> TestResult {
    init_tracing();
    let target = FakeTarget::new();
    target.respond_to_inject_with(StatusCode::INTERNAL_SERVER_ERROR);
    let addr = serve(target.clone()).await;
    let cluster = web_cluster(0);
    let metrics = metrics();

    let config = ExperimentConfigBuilder::external("ext-500", &format!("http://{addr}"))
        .duration(30)
        .build();
    let controller = Controller::build(&config, &deps(&cluster, &metrics))?;
    controller.start()?;

    assert_eq!(wait_finished(&controller).await, ExperimentStatus::Failed);
    assert_eq!(target.paths(), vec!["/", "/cleanup"]);
    assert_eq!(metrics.experiments_failed.get(), 1);
    Ok(())
}

#[tokio::test]
async fn bearer_token_and_custom_cleanup_endpoint() -> TestResult {
    init_tracing();
    let target = FakeTarget::new();
    let addr = serve(target.clone()).await;
    let cluster = web_cluster(0);
    let metrics = metrics();

    let config = ExperimentConfigBuilder::external("ext-auth", &format!("http://{addr}/"))
        .param("endpoint", "inject")
        .param("cleanup_endpoint", "/custom/cleanup")
        .param("auth_token", "s3cret")
        .duration(1)
        .build();
    let controller = Controller::build(&config, &deps(&cluster, &metrics))?;
    controller.start()?;

    assert_eq!(wait_finished(&controller).await, ExperimentStatus::Completed);
    assert_eq!(target.paths(), vec!["/inject", "/custom/cleanup"]);
    for request in target.requests() {
        assert_eq!(request.auth.as_deref(), Some("Bearer s3cret"));
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_target_fails() -> TestResult {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let cluster = web_cluster(0);
    let metrics = metrics();
    let config = ExperimentConfigBuilder::external("ext-down", &format!("http://{addr}"))
        .duration(30)
        .build();
    let controller = Controller::build(&config, &deps(&cluster, &metrics))?;
    controller.start()?;

    assert_eq!(wait_finished(&controller).await, ExperimentStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn invalid_target_is_a_creation_error() {
    init_tracing();
    let cluster = web_cluster(0);
    let metrics = metrics();
    let deps = deps(&cluster, &metrics);

    let empty = ExperimentConfigBuilder::external("ext-empty", "").build();
    assert!(matches!(
        Controller::build(&empty, &deps),
        Err(ChaosError::ControllerCreation(_))
    ));

    let garbage = ExperimentConfigBuilder::external("ext-garbage", "not a url").build();
    assert!(matches!(
        Controller::build(&garbage, &deps),
        Err(ChaosError::ControllerCreation(_))
    ));
}

#[test]
fn urls_are_target_and_endpoint_concatenated() -> TestResult {
    let config = ExperimentConfigBuilder::external("urls", "http://chaos.test/api/")
        .param("endpoint", "inject")
        .param("cleanup_endpoint", "/undo")
        .build();
    let controller = ExternalController::new(&config, reqwest::Client::new(), Duration::from_secs(1))?;
    assert_eq!(controller.inject_url(), "http://chaos.test/api/inject");
    assert_eq!(controller.cleanup_url(), "http://chaos.test/api//undo");

    let bare = ExperimentConfigBuilder::external("bare", "http://chaos.test").build();
    let controller = ExternalController::new(&bare, reqwest::Client::new(), Duration::from_secs(1))?;
    assert_eq!(controller.inject_url(), "http://chaos.test");
    assert_eq!(controller.cleanup_url(), "http://chaos.test/cleanup");
    Ok(())
}
