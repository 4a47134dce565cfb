//! Background iteration loop.
//!
//! Runs one automation pass, waits for it to settle, sleeps for the
//! configured interval, and repeats until cancelled. A failed pass is
//! logged and the loop carries on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::automation::AutomationClient;

/// Observable state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started yet.
    Idle,
    RunningIteration,
    Sleeping,
    /// Cancelled; the loop has exited.
    Stopped,
}

/// Repeats automation passes on a fixed interval until cancelled.
pub struct IterationLoop {
    client: Arc<dyn AutomationClient>,
    interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<LoopState>,
}

impl IterationLoop {
    pub fn new(
        client: Arc<dyn AutomationClient>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            client,
            interval,
            cancel,
            state,
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Run until the cancellation token fires. Returns the number of
    /// iterations started.
    ///
    /// Cancellation interrupts the sleep immediately. An iteration that is
    /// already running is allowed to settle first.
    pub async fn run(self) -> u64 {
        let mut iteration: u64 = 0;

        while !self.cancel.is_cancelled() {
            iteration += 1;
            self.state.send_replace(LoopState::RunningIteration);
            tracing::info!(iteration, "starting automation iteration");

            match AssertUnwindSafe(self.client.run_pass()).catch_unwind().await {
                Ok(Ok(())) => tracing::info!(iteration, "automation iteration finished"),
                Ok(Err(e)) => {
                    tracing::error!(iteration, error = %format!("{e:#}"), "automation iteration failed");
                }
                Err(_) => tracing::error!(iteration, "automation iteration panicked"),
            }

            self.state.send_replace(LoopState::Sleeping);
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state.send_replace(LoopState::Stopped);
        tracing::info!(iterations = iteration, "automation loop stopped");
        iteration
    }
}
