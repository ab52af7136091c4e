// src/controller/state.rs

//! State record shared by every controller kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::ExperimentStatus;

/// Status, stop signal and done signal of one controller.
///
/// - `status` is only read or written under its own lock.
/// - `stopping` makes the stop signal fire at most once.
/// - `cancel` is what the running fault algorithm selects on.
/// - `done` flips to `true` when the background task exits.
#[derive(Debug)]
pub struct ControllerState {
    id: String,
    status: RwLock<ExperimentStatus>,
    stopping: AtomicBool,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

impl ControllerState {
    pub fn new(id: impl Into<String>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: id.into(),
            status: RwLock::new(ExperimentStatus::Pending),
            stopping: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            done,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ExperimentStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` if the transition goes forward; returns whether it
    /// was applied. Terminal statuses are never overwritten.
    pub fn transition(&self, next: ExperimentStatus) -> bool {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if status.can_transition_to(next) {
            debug!(experiment = %self.id, from = %*status, to = %next, "controller status");
            *status = next;
            true
        } else {
            false
        }
    }

    /// Like [`transition`](Self::transition), but only from `expected`.
    pub fn transition_from(&self, expected: ExperimentStatus, next: ExperimentStatus) -> bool {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if *status == expected && status.can_transition_to(next) {
            debug!(experiment = %self.id, from = %*status, to = %next, "controller status");
            *status = next;
            true
        } else {
            false
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the stop token. Returns `false` if a stop was already requested.
    pub fn request_stop(&self) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            debug!(experiment = %self.id, "stop already requested");
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn mark_done(&self) {
        self.done.send_replace(true);
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until the background task has exited.
    pub async fn wait_done(&self) {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so this only ends once done.
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Marks the state done when dropped, including on panic.
pub(crate) struct DoneGuard<'a>(pub(crate) &'a ControllerState);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}
