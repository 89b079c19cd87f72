//! Round record: metadata + request.

use chrono::{DateTime, Utc};

use super::RoundState;
use crate::domain::{ErrorKind, RoundReport, Stage, SubmissionId, TaskRequest};

/// Metadata + request for a round in the queue.
///
/// This is the single source of truth for a submission's state; the queue
/// structures (ready / scheduled / per-task lines) hold ids only.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub submission_id: SubmissionId,
    pub request: TaskRequest,
    pub state: RoundState,

    /// Last pipeline stage reported by the running attempt.
    pub stage: Stage,

    /// Number of times this round has been executed (including the current
    /// attempt if Running).
    pub attempts: u32,

    pub max_attempts: u32,

    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,

    /// Set once the round succeeds.
    pub report: Option<RoundReport>,

    /// When to retry next (for RetryScheduled state).
    pub next_run_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoundRecord {
    pub fn new(
        submission_id: SubmissionId,
        request: TaskRequest,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id,
            request,
            state: RoundState::Queued,
            stage: Stage::Received,
            attempts: 0,
            max_attempts,
            last_error: None,
            last_error_kind: None,
            report: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as running (increment attempts, restart the stage trail).
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.state = RoundState::Running;
        self.stage = Stage::Received;
        self.attempts += 1;
        self.updated_at = now;
    }

    pub fn enter_stage(&mut self, stage: Stage, now: DateTime<Utc>) {
        self.stage = stage;
        self.updated_at = now;
    }

    pub fn mark_succeeded(&mut self, report: RoundReport, now: DateTime<Utc>) {
        self.state = RoundState::Succeeded;
        self.stage = Stage::Done;
        self.report = Some(report);
        self.updated_at = now;
    }

    pub fn mark_dead(&mut self, error: String, kind: ErrorKind, now: DateTime<Utc>) {
        self.state = RoundState::Dead;
        self.last_error = Some(error);
        self.last_error_kind = Some(kind);
        self.next_run_at = None;
        self.updated_at = now;
    }

    /// Schedule retry with backoff.
    pub fn schedule_retry(
        &mut self,
        next_run_at: DateTime<Utc>,
        error: String,
        kind: ErrorKind,
        now: DateTime<Utc>,
    ) {
        self.state = RoundState::RetryScheduled;
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
        self.last_error_kind = Some(kind);
        self.updated_at = now;
    }

    /// Move from RetryScheduled back to Queued.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.state = RoundState::Queued;
        self.next_run_at = None;
        self.updated_at = now;
    }
}
