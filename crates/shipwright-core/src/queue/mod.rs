//! Round queue: state management, retry logic, and in-memory implementation.
//!
//! The front door enqueues, workers lease. A lease reports stage changes while
//! the pipeline runs and ends with exactly one `ack` or `fail`.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryRoundQueue;
pub use record::RoundRecord;
pub use retry::RetryPolicy;
pub use state::RoundState;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{RoundKey, RoundReport, SubmissionId, TaskRequest};
use crate::error::PipelineError;
use crate::observability::{QueueCounts, RoundStatus};
use crate::ports::EventSink;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full ({limit} rounds pending)")]
    Full { limit: usize },

    #[error("round {key} is already pending as {existing}")]
    Duplicate {
        key: RoundKey,
        existing: SubmissionId,
    },

    #[error("submission {0} is not known to the queue")]
    Unknown(SubmissionId),
}

/// A leased round.
/// The worker owns this lease and must either `ack` or `fail`.
///
/// - Queue manages state transitions (Queued -> Running -> ...).
/// - Worker/pipeline executes side effects and reports the result.
/// - Stage changes reported through `EventSink` show up in status queries.
#[async_trait]
pub trait RoundLease: EventSink {
    fn submission_id(&self) -> SubmissionId;

    fn request(&self) -> &TaskRequest;

    /// 1-indexed attempt number of this lease.
    fn attempt(&self) -> u32;

    /// Mark success.
    async fn ack(self: Box<Self>, report: RoundReport) -> Result<(), QueueError>;

    /// Mark failure (queue decides retry/dead from the error kind).
    async fn fail(self: Box<Self>, error: &PipelineError) -> Result<(), QueueError>;
}

/// Queue port (interface).
#[async_trait]
pub trait RoundQueue: Send + Sync {
    /// Accept a round. Fails when the queue is full or the same round is
    /// still pending.
    async fn enqueue(&self, request: TaskRequest) -> Result<SubmissionId, QueueError>;

    /// Lease one runnable round (waits until one is available).
    async fn lease(&self) -> Option<Box<dyn RoundLease>>;

    async fn status(&self, submission_id: SubmissionId) -> Option<RoundStatus>;

    async fn counts(&self) -> QueueCounts;

    /// Forget succeeded or dead submissions last updated at or before
    /// `finished_before`, with their attempt and decision history.
    /// Returns how many submissions were dropped.
    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> usize;
}
