// src/experiment/wait.rs

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Which side of the timer/stop race won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Wait for `duration`, or until `cancel` fires, whichever comes first.
///
/// A token that is already cancelled wins even for a zero duration. A
/// duration too large to add to the clock waits until cancelled.
pub async fn wait_for(duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
    }
}
