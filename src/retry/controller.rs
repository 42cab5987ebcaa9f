//! Decide what happens to a task after each attempt.

use super::policy::RetryPolicy;
use crate::download::{DownloadTask, TaskState};
use crate::error::{Failure, FailureKind};

use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one transfer attempt, as produced by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every byte is on disk.
    Completed { bytes: u64 },
    /// The attempt failed for a classified reason.
    Failed(Failure),
    /// The attempt cannot succeed as configured.
    Fatal(Failure),
    /// Cancellation stopped the attempt; `bytes` are durably on disk.
    Paused { bytes: u64 },
}

impl AttemptOutcome {
    /// Wrap a failure, routing configuration problems to [`AttemptOutcome::Fatal`].
    pub fn from_failure(failure: Failure) -> Self {
        if failure.kind == FailureKind::FatalConfig {
            AttemptOutcome::Fatal(failure)
        } else {
            AttemptOutcome::Failed(failure)
        }
    }
}

/// What the dispatcher should do with a task next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The task reached Completed or Failed.
    Finished,
    /// The task was paused by cancellation.
    Paused,
    /// Wait this long outside the slot pool, then run another attempt.
    RetryAfter(Duration),
}

/// Applies a [`RetryPolicy`] to attempt outcomes.
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Count a new attempt and mark the task as transferring.
    pub fn begin_attempt(&self, task: &mut DownloadTask) {
        task.attempt_count += 1;
        task.set_state(TaskState::InProgress);
        debug!(
            "Starting attempt {}/{} for {}",
            task.attempt_count, self.policy.max_attempts, task.source
        );
    }

    /// Fold `outcome` into `task` and decide the next step.
    pub fn decide(&self, task: &mut DownloadTask, outcome: AttemptOutcome) -> Decision {
        match outcome {
            AttemptOutcome::Completed { bytes } => {
                task.bytes_downloaded = bytes;
                task.last_error = None;
                task.set_state(TaskState::Completed);
                info!("Completed {} ({} bytes)", task.destination.display(), bytes);
                Decision::Finished
            }
            AttemptOutcome::Paused { bytes } => {
                task.bytes_downloaded = bytes;
                task.set_state(TaskState::Paused);
                info!(
                    "Paused {} at {} bytes",
                    task.destination.display(),
                    bytes
                );
                Decision::Paused
            }
            AttemptOutcome::Fatal(failure) => {
                warn!("Giving up on {}: {}", task.source, failure);
                task.fail(failure);
                Decision::Finished
            }
            AttemptOutcome::Failed(failure) => self.on_failure(task, failure),
        }
    }

    fn on_failure(&self, task: &mut DownloadTask, failure: Failure) -> Decision {
        match failure.kind {
            kind if kind.is_retryable() => {
                if self.policy.has_budget(task.attempt_count) {
                    let delay = self.policy.delay_for(task.attempt_count);
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        task.attempt_count, self.policy.max_attempts, task.source, failure, delay
                    );
                    task.last_error = Some(failure);
                    task.set_state(TaskState::Paused);
                    Decision::RetryAfter(delay)
                } else {
                    warn!(
                        "Retry budget of {} attempts exhausted for {}: {}",
                        self.policy.max_attempts, task.source, failure
                    );
                    task.fail(failure);
                    Decision::Finished
                }
            }
            FailureKind::Integrity if !task.integrity_retry_used => {
                warn!(
                    "Integrity check failed for {} ({}), downloading it again from scratch",
                    task.source, failure
                );
                task.integrity_retry_used = true;
                task.discard_partial = true;
                task.last_error = Some(failure);
                task.set_state(TaskState::Paused);
                Decision::RetryAfter(Duration::ZERO)
            }
            _ => {
                warn!("Giving up on {}: {}", task.source, failure);
                task.fail(failure);
                Decision::Finished
            }
        }
    }
}
