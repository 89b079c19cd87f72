//! Round state machine for the queue.

use serde::{Deserialize, Serialize};

/// Queue-side state of one submitted round.
///
/// State transitions:
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> RetryScheduled -> Queued (loop until max_attempts)
/// - Queued -> Running -> Dead (permanent failure, or max_attempts exhausted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Waiting for a worker (and for earlier rounds of the same task).
    Queued,

    /// Currently being executed by a worker.
    Running,

    /// Completed; the report is available.
    Succeeded,

    /// Waiting for retry (delayed due to backoff).
    RetryScheduled,

    /// Failed for good.
    Dead,
}

impl RoundState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundState::Succeeded | RoundState::Dead)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundState::Queued => "queued",
            RoundState::Running => "running",
            RoundState::Succeeded => "succeeded",
            RoundState::RetryScheduled => "retry_scheduled",
            RoundState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
