//! Attempt and Decision models for execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;
use super::ids::{AttemptId, SubmissionId};

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error_kind: ErrorKind, error: String },
}

/// A single execution attempt of a submission.
///
/// This is the foundation of "why did round N end up dead" answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub submission_id: SubmissionId,
    /// 1-indexed attempt number within the submission.
    pub number: u32,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// A decision made after a failed attempt.
///
/// Records what triggered it, which policy was applied, and what was decided
/// (`schedule_retry` or `mark_dead`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub submission_id: SubmissionId,

    /// What was observed that triggered this decision.
    pub trigger: serde_json::Value,

    /// Policy that was applied, e.g. `"retry_policy"`.
    pub policy: String,

    /// Action that was decided, e.g. `"schedule_retry"`.
    pub decision: String,

    /// Additional context (delay, next run time, ...).
    pub context: Option<serde_json::Value>,

    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        submission_id: SubmissionId,
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
        context: Option<serde_json::Value>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id,
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            context,
            decided_at,
        }
    }
}
