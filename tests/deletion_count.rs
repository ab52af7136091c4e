mod common;

use proptest::prelude::*;

use chaos_operator::errors::ChaosError;
use chaos_operator::experiment::{deletion_count, extract_params, run_pod_failure};
use chaos_operator::types::FaultType;
use tokio_util::sync::CancellationToken;

use crate::common::builders::cluster_params;
use crate::common::{TestResult, init_tracing, web_cluster};

#[test]
fn ten_targets_at_thirty_percent_deletes_three() {
    assert_eq!(deletion_count(10, 30), 3);
}

#[test]
fn one_target_at_ten_percent_still_deletes_one() {
    assert_eq!(deletion_count(1, 10), 1);
}

#[test]
fn nothing_found_deletes_nothing() {
    assert_eq!(deletion_count(0, 100), 0);
}

proptest! {
    #[test]
    fn deletion_count_follows_floor_with_minimum_one(found in 1usize..500, pct in 1u32..=100) {
        let expected = std::cmp::max(1, std::cmp::min(found, found * pct as usize / 100));
        let count = deletion_count(found, pct);
        prop_assert_eq!(count, expected);
        prop_assert!(count >= 1);
        prop_assert!(count <= found);
    }
}

#[tokio::test(start_paused = true)]
async fn no_matching_targets_is_an_error_and_nothing_is_deleted() -> TestResult {
    init_tracing();
    let cluster = web_cluster(0);
    let params = extract_params(FaultType::PodFailure, &cluster_params("default", "app=web"))?;

    let err = run_pod_failure(
        "exp-empty",
        &cluster,
        &params,
        std::time::Duration::from_secs(1),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ChaosError::NoMatchingTargets { .. }));
    assert!(cluster.deleted().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deletes_in_listing_order_and_records_metrics() -> TestResult {
    init_tracing();
    let cluster = web_cluster(10);
    let mut raw = cluster_params("default", "app=web");
    raw.insert("percentage".to_string(), "30".to_string());
    let params = extract_params(FaultType::PodFailure, &raw)?;

    let result = run_pod_failure(
        "exp-30",
        &cluster,
        &params,
        std::time::Duration::from_secs(1),
        &CancellationToken::new(),
    )
    .await?;

    assert_eq!(cluster.deleted(), vec!["web-0", "web-1", "web-2"]);
    assert_eq!(result.affected_resources, vec!["web-0", "web-1", "web-2"]);
    assert_eq!(result.metrics.get("targets_found"), Some(&10.0));
    assert_eq!(result.metrics.get("targets_deleted"), Some(&3.0));
    assert_eq!(result.metrics.get("percentage"), Some(&30.0));
    assert!(result.success);
    assert!(cluster.remaining("default").contains(&"db-0".to_string()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn a_failed_deletion_is_skipped() -> TestResult {
    init_tracing();
    let cluster = web_cluster(2);
    cluster.fail_deletion_of("web-0");
    let params = extract_params(FaultType::PodFailure, &cluster_params("default", "app=web"))?;

    let result = run_pod_failure(
        "exp-partial",
        &cluster,
        &params,
        std::time::Duration::from_secs(1),
        &CancellationToken::new(),
    )
    .await?;

    assert_eq!(result.affected_resources, vec!["web-1"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_deletion_failing_fails_the_run() -> TestResult {
    init_tracing();
    let cluster = web_cluster(1);
    cluster.fail_deletion_of("web-0");
    let params = extract_params(FaultType::PodFailure, &cluster_params("default", "app=web"))?;

    let err = run_pod_failure(
        "exp-none",
        &cluster,
        &params,
        std::time::Duration::from_secs(1),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ChaosError::TargetDeletionFailed { attempted: 1 }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn the_hold_starts_after_slow_deletions() -> TestResult {
    init_tracing();
    let cluster = web_cluster(1);
    cluster.set_delete_delay(std::time::Duration::from_secs(10));
    let params = extract_params(FaultType::PodFailure, &cluster_params("default", "app=web"))?;

    let started = tokio::time::Instant::now();
    let result = run_pod_failure(
        "exp-slow-delete",
        &cluster,
        &params,
        std::time::Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await?;

    assert_eq!(result.affected_resources, vec!["web-0"]);
    assert!(started.elapsed() >= std::time::Duration::from_secs(15));
    Ok(())
}

#[test]
fn missing_namespace_or_selector_is_rejected_for_every_fault() {
    for fault in [
        FaultType::PodFailure,
        FaultType::NetworkDelay,
        FaultType::CpuStress,
        FaultType::MemoryStress,
    ] {
        let mut no_ns = cluster_params("default", "app=web");
        no_ns.remove("namespace");
        assert!(matches!(
            extract_params(fault, &no_ns),
            Err(ChaosError::MissingParameter("namespace"))
        ));

        let empty_selector = cluster_params("default", "");
        assert!(matches!(
            extract_params(fault, &empty_selector),
            Err(ChaosError::MissingParameter("selector"))
        ));
    }
}

#[test]
fn bad_numeric_parameters_fall_back_to_defaults() {
    let mut raw = cluster_params("default", "app=web");
    raw.insert("delay".to_string(), "soon".to_string());
    let params = extract_params(FaultType::NetworkDelay, &raw).unwrap();
    assert_eq!(params.value, 100);

    let mut raw = cluster_params("default", "app=web");
    raw.insert("load".to_string(), "-5".to_string());
    let params = extract_params(FaultType::CpuStress, &raw).unwrap();
    assert_eq!(params.value, 80);

    let params =
        extract_params(FaultType::MemoryStress, &cluster_params("default", "app=web")).unwrap();
    assert_eq!((params.value_name, params.value), ("size", 256));
}
