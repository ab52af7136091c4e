// src/scheduler/mod.rs

//! Time-based triggering of stored experiments.
//!
//! A tick loop checks the registry at a fixed interval. Every due schedule
//! is fired on its own task through an [`ExperimentRunner`], so a slow
//! experiment never delays the next tick:
//!
//! ```text
//! tick -> due one-time schedules -> claim (in-flight set) -> spawn firing
//! firing -> runner.run_experiment(id) -> disable schedule -> release claim
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{ChaosError, Result};
use crate::executor::ExperimentRunner;
use crate::types::ScheduleKind;

pub mod schedule;

pub use schedule::Schedule;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

struct SchedulerInner {
    runner: Arc<dyn ExperimentRunner>,
    schedules: RwLock<HashMap<String, Schedule>>,
    /// Schedules whose firing task has not finished yet.
    firing: Mutex<HashSet<String>>,
    shutdown: CancellationToken,
}

pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    tick_interval: Duration,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tick_interval", &self.tick_interval)
            .field("schedules", &self.list_schedules().len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(runner: Arc<dyn ExperimentRunner>) -> Self {
        Self::with_tick_interval(runner, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(runner: Arc<dyn ExperimentRunner>, tick_interval: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                runner,
                schedules: RwLock::new(HashMap::new()),
                firing: Mutex::new(HashSet::new()),
                shutdown: CancellationToken::new(),
            }),
            tick_interval,
            tick_task: Mutex::new(None),
        }
    }

    /// Launch the tick loop. A second call is a no-op.
    pub fn start(&self) {
        let mut slot = self
            .tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let inner = self.inner.clone();
        let period = self.tick_interval;
        *slot = Some(tokio::spawn(async move {
            info!(interval = ?period, "scheduler started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let fired = SchedulerInner::check_at(&inner, Utc::now());
                        if !fired.is_empty() {
                            debug!(count = fired.len(), "schedules fired");
                        }
                    }
                }
            }
            info!("scheduler tick loop exited");
        }));
    }

    /// Stop the tick loop and cancel in-flight firings.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let task = self
            .tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "scheduler tick loop panicked");
            }
        }
        info!("scheduler stopped");
    }

    /// Run one tick as if the clock read `now`.
    ///
    /// Returns the handles of the firing tasks that were spawned.
    pub fn check_schedules_at(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        SchedulerInner::check_at(&self.inner, now)
    }

    pub fn add_schedule(&self, schedule: Schedule) -> Result<()> {
        schedule.validate()?;
        if schedule.kind == ScheduleKind::Cron {
            warn!(
                schedule = %schedule.id,
                "cron schedules are accepted but never fired"
            );
        }
        info!(schedule = %schedule.id, experiment = %schedule.experiment_id, kind = %schedule.kind, "schedule added");
        self.inner
            .schedules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schedule.id.clone(), schedule);
        Ok(())
    }

    pub fn remove_schedule(&self, id: &str) -> Result<Schedule> {
        let removed = self
            .inner
            .schedules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| ChaosError::ScheduleNotFound(id.to_string()))?;
        info!(schedule = %id, "schedule removed");
        Ok(removed)
    }

    pub fn get_schedule(&self, id: &str) -> Option<Schedule> {
        self.inner
            .schedules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// All schedules, sorted by id.
    pub fn list_schedules(&self) -> Vec<Schedule> {
        let mut all: Vec<Schedule> = self
            .inner
            .schedules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl SchedulerInner {
    fn check_at(this: &Arc<Self>, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        // Due check and claim happen under the same schedules lock.
        let claimed: Vec<(String, String)> = {
            let schedules = this
                .schedules
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let mut firing = this.firing.lock().unwrap_or_else(PoisonError::into_inner);
            schedules
                .values()
                .filter(|s| s.is_due(now))
                .filter(|s| {
                    let fresh = firing.insert(s.id.clone());
                    if !fresh {
                        debug!(schedule = %s.id, "schedule already firing");
                    }
                    fresh
                })
                .map(|s| (s.id.clone(), s.experiment_id.clone()))
                .collect()
        };

        claimed
            .into_iter()
            .map(|(schedule_id, experiment_id)| {
                let inner = Arc::clone(this);
                tokio::spawn(async move {
                    inner.fire(&schedule_id, &experiment_id).await;
                })
            })
            .collect()
    }

    async fn fire(&self, schedule_id: &str, experiment_id: &str) {
        info!(schedule = %schedule_id, experiment = %experiment_id, "firing schedule");

        let cancel = self.shutdown.child_token();
        match self.runner.run_experiment(experiment_id, cancel).await {
            Ok(result) => {
                info!(schedule = %schedule_id, experiment = %experiment_id, success = result.success, "scheduled experiment finished");
            }
            Err(err) => {
                error!(schedule = %schedule_id, experiment = %experiment_id, error = %err, "scheduled experiment failed");
            }
        }

        {
            let mut schedules = self
                .schedules
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(schedule) = schedules.get_mut(schedule_id) {
                if schedule.kind == ScheduleKind::OneTime {
                    schedule.enabled = false;
                    schedule.updated_at = Utc::now();
                }
            }
        }

        self.firing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(schedule_id);
    }
}
