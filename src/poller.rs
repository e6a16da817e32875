//! Bounded-retry polling for asynchronous analysis tasks.
//!
//! The analysis backend exposes a task-status endpoint; this module drives
//! the loop that bridges that asynchronous job to synchronous form state.
//! Budget exhaustion and cancellation are first-class state transitions
//! rather than side effects of a timer handle: the loop publishes every
//! state change on a watch channel and resolves to a single [`PollOutcome`].
//!
//! One probe is issued per tick, serially. There is no retry after a
//! failure; all failure paths (explicit FAILURE, transport or decode error,
//! exhausted budget) stop the loop and surface to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{ItemAnalysis, TaskStatus};

/// Fixed budget and delay for a poll loop. The defaults (10 attempts, 4s
/// apart) are part of the observable contract and bound total polling at
/// roughly 40 seconds.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_POLL_ATTEMPTS,
            interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl PollPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.analysis_max_poll_attempts,
            interval: Duration::from_secs(cfg.analysis_poll_interval_secs),
        }
    }
}

/// Snapshot returned by one status probe.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    pub result: Option<ItemAnalysis>,
}

/// One status query against the backend. Implemented over HTTP in the
/// analysis service and over scripted responses in tests.
#[async_trait]
pub trait TaskStatusProbe: Send + Sync {
    async fn probe(&self, task_id: &str) -> Result<TaskSnapshot, ServiceError>;
}

/// Observable state of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling { attempt: u32 },
    Succeeded(ItemAnalysis),
    Failed { message: String },
    TimedOut,
}

/// Terminal result of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Succeeded(ItemAnalysis),
    Failed { message: String },
    TimedOut,
    /// Cancelled locally. The server-side job, if any, keeps running;
    /// cancellation is fire-and-forget.
    Cancelled,
}

/// Drive the loop to a terminal outcome, publishing intermediate states.
///
/// Probes are counted before they are issued, so a budget of N means
/// exactly N status queries in the all-PENDING case. Cancellation is
/// checked before each probe and during each inter-probe delay; a
/// cancelled loop resets the published state to `Idle` and issues no
/// further queries.
pub async fn run_poll_loop(
    probe: Arc<dyn TaskStatusProbe>,
    task_id: &str,
    policy: PollPolicy,
    mut cancel: watch::Receiver<bool>,
    state: watch::Sender<PollState>,
) -> PollOutcome {
    for attempt in 1..=policy.max_attempts {
        if *cancel.borrow() {
            let _ = state.send(PollState::Idle);
            return PollOutcome::Cancelled;
        }

        let _ = state.send(PollState::Polling { attempt });

        match probe.probe(task_id).await {
            Ok(snapshot) => match snapshot.status {
                TaskStatus::Success => {
                    return match snapshot.result {
                        Some(analysis) => {
                            debug!(task_id, attempt, "analysis task succeeded");
                            let _ = state.send(PollState::Succeeded(analysis.clone()));
                            PollOutcome::Succeeded(analysis)
                        }
                        None => {
                            let message =
                                "Analysis reported success without a result payload".to_string();
                            warn!(task_id, attempt, "{}", message);
                            let _ = state.send(PollState::Failed {
                                message: message.clone(),
                            });
                            PollOutcome::Failed { message }
                        }
                    };
                }
                TaskStatus::Failure => {
                    let message = "Analysis task failed".to_string();
                    warn!(task_id, attempt, "analysis task reported failure");
                    let _ = state.send(PollState::Failed {
                        message: message.clone(),
                    });
                    return PollOutcome::Failed { message };
                }
                status if status.in_progress() => {
                    debug!(task_id, attempt, %status, "analysis task still in progress");
                }
                status => {
                    // Unreachable with the current status set; treat like
                    // in-progress rather than inventing a failure mode.
                    debug!(task_id, attempt, %status, "unclassified task status");
                }
            },
            Err(err) => {
                // Transport and decode errors converge on the same terminal
                // effect as an explicit FAILURE.
                let message = format!("Status query failed: {}", err);
                warn!(task_id, attempt, error = %err, "poll probe error");
                let _ = state.send(PollState::Failed {
                    message: message.clone(),
                });
                return PollOutcome::Failed { message };
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = tokio::time::sleep(policy.interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        let _ = state.send(PollState::Idle);
                        return PollOutcome::Cancelled;
                    }
                }
            }
        }
    }

    warn!(task_id, attempts = policy.max_attempts, "analysis poll budget exhausted");
    let _ = state.send(PollState::TimedOut);
    PollOutcome::TimedOut
}

/// Handle to a spawned poll loop: observe state, cancel, or await the
/// outcome. Dropping the handle does not cancel the loop.
pub struct PollHandle {
    state_rx: watch::Receiver<PollState>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Spawn a poll loop for `task_id` on the current runtime.
    pub fn spawn(probe: Arc<dyn TaskStatusProbe>, task_id: String, policy: PollPolicy) -> Self {
        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            run_poll_loop(probe, &task_id, policy, cancel_rx, state_tx).await
        });

        Self {
            state_rx,
            cancel_tx,
            task,
        }
    }

    pub fn state(&self) -> PollState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    /// Stop the loop. Local only: no cancellation signal reaches the
    /// backend job.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub async fn outcome(self) -> PollOutcome {
        self.task.await.unwrap_or(PollOutcome::Cancelled)
    }
}
