mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use chaos_operator::errors::ChaosError;
use chaos_operator::executor::Executor;
use chaos_operator::scheduler::Scheduler;
use chaos_operator::store::InMemoryStore;
use chaos_operator::types::ExperimentStatus;
use chaos_operator_test_utils::fake_runner::FakeRunner;

use crate::common::builders::{ExperimentBuilder, ScheduleBuilder};
use crate::common::{TestResult, init_tracing, metrics, web_cluster, with_timeout};

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn past_one_time_schedule_fires_exactly_once() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();
    let scheduler = Scheduler::new(Arc::new(runner.clone()));
    let at = Utc::now() - ChronoDuration::minutes(5);
    scheduler.add_schedule(ScheduleBuilder::one_time("s1", "exp-1", at).build())?;

    let first_tick = Utc::now();
    join_all(scheduler.check_schedules_at(first_tick)).await;
    join_all(scheduler.check_schedules_at(first_tick + ChronoDuration::minutes(1))).await;

    assert_eq!(runner.invocations(), vec!["exp-1"]);
    let schedule = scheduler.get_schedule("s1").unwrap();
    assert!(!schedule.enabled);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn overlapping_ticks_do_not_fire_twice() -> TestResult {
    init_tracing();
    let runner = FakeRunner::with_delay(Duration::from_secs(5));
    let scheduler = Scheduler::new(Arc::new(runner.clone()));
    let now = Utc::now();
    scheduler.add_schedule(ScheduleBuilder::one_time("slow", "exp-slow", now).build())?;

    let first = scheduler.check_schedules_at(now);
    assert_eq!(first.len(), 1);
    tokio::task::yield_now().await;

    let second = scheduler.check_schedules_at(now + ChronoDuration::minutes(1));
    assert!(second.is_empty());

    with_timeout(join_all(first)).await;
    assert_eq!(runner.count_for("exp-slow"), 1);
    assert!(!scheduler.get_schedule("slow").unwrap().enabled);
    Ok(())
}

#[tokio::test]
async fn future_and_disabled_schedules_do_not_fire() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();
    let scheduler = Scheduler::new(Arc::new(runner.clone()));
    let now = Utc::now();
    scheduler.add_schedule(
        ScheduleBuilder::one_time("later", "exp-later", now + ChronoDuration::hours(1)).build(),
    )?;
    scheduler.add_schedule(
        ScheduleBuilder::one_time("off", "exp-off", now - ChronoDuration::hours(1))
            .disabled()
            .build(),
    )?;

    assert!(scheduler.check_schedules_at(now).is_empty());
    assert!(runner.invocations().is_empty());
    assert!(scheduler.get_schedule("later").unwrap().enabled);
    Ok(())
}

#[tokio::test]
async fn failed_firing_is_not_retried() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();
    runner.fail("exp-bad");
    let scheduler = Scheduler::new(Arc::new(runner.clone()));
    let now = Utc::now();
    scheduler.add_schedule(ScheduleBuilder::one_time("bad", "exp-bad", now).build())?;

    join_all(scheduler.check_schedules_at(now)).await;
    join_all(scheduler.check_schedules_at(now + ChronoDuration::minutes(1))).await;

    assert_eq!(runner.count_for("exp-bad"), 1);
    assert!(!scheduler.get_schedule("bad").unwrap().enabled);
    Ok(())
}

#[tokio::test]
async fn cron_schedules_are_validated_but_never_fired() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();
    let scheduler = Scheduler::new(Arc::new(runner.clone()));

    scheduler.add_schedule(ScheduleBuilder::cron("every-min", "exp-c", "0 * * * * *").build())?;
    let err = scheduler
        .add_schedule(ScheduleBuilder::cron("broken", "exp-c", "whenever").build())
        .unwrap_err();
    assert!(matches!(err, ChaosError::Config(_)));

    let now = Utc::now();
    for minute in 0..5 {
        assert!(scheduler
            .check_schedules_at(now + ChronoDuration::minutes(minute))
            .is_empty());
    }
    assert!(runner.invocations().is_empty());

    let schedule = scheduler.get_schedule("every-min").unwrap();
    let next = schedule.next_cron_occurrence(now).unwrap();
    assert!(next > now && next <= now + ChronoDuration::minutes(1));
    Ok(())
}

#[tokio::test]
async fn registry_accessors() -> TestResult {
    init_tracing();
    let scheduler = Scheduler::new(Arc::new(FakeRunner::new()));
    let at = Utc::now();
    scheduler.add_schedule(ScheduleBuilder::one_time("b", "exp", at).build())?;
    scheduler.add_schedule(ScheduleBuilder::one_time("a", "exp", at).build())?;

    let ids: Vec<String> = scheduler.list_schedules().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let removed = scheduler.remove_schedule("a")?;
    assert_eq!(removed.id, "a");
    assert!(scheduler.get_schedule("a").is_none());
    assert!(matches!(
        scheduler.remove_schedule("a"),
        Err(ChaosError::ScheduleNotFound(_))
    ));

    let mut no_time = ScheduleBuilder::one_time("c", "exp", at).build();
    no_time.execute_at = None;
    assert!(matches!(
        scheduler.add_schedule(no_time),
        Err(ChaosError::Config(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn tick_loop_fires_due_schedules() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();
    let scheduler =
        Scheduler::with_tick_interval(Arc::new(runner.clone()), Duration::from_secs(60));
    scheduler.add_schedule(
        ScheduleBuilder::one_time("due", "exp-due", Utc::now() - ChronoDuration::seconds(1))
            .build(),
    )?;

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(150)).await;
    with_timeout(scheduler.stop()).await;

    assert_eq!(runner.invocations(), vec!["exp-due"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_in_flight_firings() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let cluster = web_cluster(2);
    let metrics = metrics();
    let executor = Arc::new(Executor::new(
        store.clone(),
        Arc::new(cluster.clone()),
        metrics.clone(),
    ));
    store.insert(ExperimentBuilder::new("exp-run").duration(600).build());

    let scheduler = Scheduler::new(executor);
    let now = Utc::now();
    scheduler.add_schedule(ScheduleBuilder::one_time("run", "exp-run", now).build())?;

    let handles = scheduler.check_schedules_at(now);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.status_of("exp-run"), Some(ExperimentStatus::Running));

    with_timeout(scheduler.stop()).await;
    with_timeout(join_all(handles)).await;

    assert_eq!(store.status_of("exp-run"), Some(ExperimentStatus::Cancelled));
    assert_eq!(metrics.active(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn schedule_runs_a_stored_experiment_end_to_end() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let cluster = web_cluster(4);
    let metrics = metrics();
    let executor = Arc::new(Executor::new(
        store.clone(),
        Arc::new(cluster.clone()),
        metrics.clone(),
    ));
    store.insert(
        ExperimentBuilder::new("exp-e2e")
            .param("percentage", "25")
            .duration(5)
            .build(),
    );

    let scheduler = Scheduler::new(executor);
    let now = Utc::now();
    scheduler.add_schedule(ScheduleBuilder::one_time("e2e", "exp-e2e", now).build())?;

    with_timeout(join_all(scheduler.check_schedules_at(now))).await;

    assert_eq!(store.status_of("exp-e2e"), Some(ExperimentStatus::Completed));
    assert_eq!(cluster.deleted(), vec!["web-0"]);
    assert_eq!(metrics.experiments_executed.get(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ticks_fire_a_one_time_schedule_once() -> TestResult {
    init_tracing();
    for round in 0..50 {
        let runner = FakeRunner::new();
        let scheduler = Arc::new(Scheduler::new(Arc::new(runner.clone())));
        let now = Utc::now();
        scheduler.add_schedule(ScheduleBuilder::one_time("race", "exp-race", now).build())?;

        let ticks: Vec<_> = (0..8)
            .map(|i| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    scheduler.check_schedules_at(now + ChronoDuration::seconds(i))
                })
            })
            .collect();
        for tick in ticks {
            join_all(with_timeout(tick).await?).await;
        }

        assert_eq!(runner.count_for("exp-race"), 1, "round {round}");
        assert!(!scheduler.get_schedule("race").unwrap().enabled);
    }
    Ok(())
}
