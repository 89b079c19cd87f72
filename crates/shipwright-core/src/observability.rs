//! Status views served to operators and the status endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorKind, Round, RoundReport, Stage, SubmissionId, TaskId};
use crate::queue::{RoundRecord, RoundState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub retry_scheduled: usize,
    pub dead: usize,
}

impl QueueCounts {
    pub fn add(&mut self, state: RoundState) {
        match state {
            RoundState::Queued => self.queued += 1,
            RoundState::Running => self.running += 1,
            RoundState::Succeeded => self.succeeded += 1,
            RoundState::RetryScheduled => self.retry_scheduled += 1,
            RoundState::Dead => self.dead += 1,
        }
    }

    /// Rounds that still occupy queue capacity.
    pub fn pending(&self) -> usize {
        self.queued + self.running + self.retry_scheduled
    }
}

/// Where a submitted round is and, once finished, how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub submission_id: SubmissionId,
    pub task: TaskId,
    pub round: Round,
    pub state: RoundState,
    pub stage: Stage,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub report: Option<RoundReport>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RoundRecord> for RoundStatus {
    fn from(record: &RoundRecord) -> Self {
        Self {
            submission_id: record.submission_id,
            task: record.request.task.clone(),
            round: record.request.round,
            state: record.state,
            stage: record.stage,
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            last_error: record.last_error.clone(),
            last_error_kind: record.last_error_kind,
            report: record.report.clone(),
            next_run_at: record.next_run_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
