//! Evaluation scheduling.
//!
//! A single recurring background task plus an on-demand trigger, both
//! funnelled through the engine's single-flight guard. Overlapping
//! firings are dropped, never queued; a dropped firing simply means the
//! next scheduled one reassesses fresh metrics.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::engine::{Engine, RunOutcome};
use crate::error::{EngineError, StagegateError};

/// Why a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunCause {
    Scheduled,
    OnDemand,
}

/// Handle for poking a running scheduler: on-demand triggers and
/// shutdown.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Requests an on-demand evaluation run.
    ///
    /// Returns `false` when the request was dropped because a trigger is
    /// already pending — the pending run will see the same fresh metrics.
    pub fn trigger_now(&self) -> bool {
        match self.trigger_tx.try_send(()) {
            Ok(()) => true,
            Err(_) => {
                debug!("on-demand trigger already pending; dropped");
                false
            }
        }
    }

    /// Stops the scheduler loop. In-flight runs finish before the
    /// scheduler task completes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Drives recurring and on-demand evaluation runs.
pub struct EvaluationScheduler {
    engine: Arc<Engine>,
    interval: Duration,
    cancel: CancellationToken,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

impl EvaluationScheduler {
    /// Creates a scheduler over the given engine with the given
    /// recurring interval.
    #[must_use]
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            engine,
            interval,
            cancel: CancellationToken::new(),
            trigger_tx,
            trigger_rx,
        }
    }

    /// Returns a handle for triggering and stopping the scheduler.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            trigger_tx: self.trigger_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Starts the scheduler loop.
    ///
    /// The first scheduled run happens one full interval after start;
    /// use the handle's trigger for an immediate run. Each firing spawns
    /// the run so the loop keeps receiving triggers — the engine's
    /// single-flight guard drops overlaps.
    pub fn start(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // First tick completes immediately; consume it so the first
            // scheduled run is one interval out.
            ticker.tick().await;
            // A tick missed because the runtime was busy is dropped, not
            // replayed in a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let tracker = TaskTracker::new();
            info!(interval_secs = self.interval.as_secs(), "evaluation scheduler started");

            loop {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        debug!("scheduler cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        Self::spawn_run(&tracker, Arc::clone(&self.engine), RunCause::Scheduled);
                    }
                    Some(()) = self.trigger_rx.recv() => {
                        Self::spawn_run(&tracker, Arc::clone(&self.engine), RunCause::OnDemand);
                    }
                }
            }

            // Let any in-flight run finish its persistence step.
            tracker.close();
            tracker.wait().await;
            info!("evaluation scheduler stopped");
        })
    }

    fn spawn_run(tracker: &TaskTracker, engine: Arc<Engine>, cause: RunCause) {
        tracker.spawn(async move {
            match engine.try_run().await {
                Ok(RunOutcome::Transitioned { event }) => {
                    info!(cause = ?cause, from = %event.from_phase, to = %event.to_phase, "run transitioned");
                }
                Ok(RunOutcome::NotReady { failed, recommendations }) => {
                    info!(cause = ?cause, failed, recommendations, "run complete; not ready");
                }
                Ok(RunOutcome::Terminal) => {
                    debug!(cause = ?cause, "run complete; terminal phase");
                }
                Err(StagegateError::Engine(EngineError::RunInProgress)) => {
                    // Expected under overlap; already logged and counted.
                }
                Err(err) => {
                    warn!(cause = ?cause, error = %err, "run abandoned; state untouched");
                }
            }
        });
    }
}

impl std::fmt::Debug for EvaluationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
