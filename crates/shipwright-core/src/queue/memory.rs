//! In-memory round queue implementation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{QueueError, RetryPolicy, RoundLease, RoundQueue, RoundRecord, RoundState};
use crate::config::QueueConfig;
use crate::domain::{
    AttemptOutcome, AttemptRecord, Decider, Decision, DecisionRecord, DefaultDecider, RoundKey,
    RoundReport, Stage, SubmissionId, TaskId, TaskRequest,
};
use crate::error::PipelineError;
use crate::observability::{QueueCounts, RoundStatus};
use crate::ports::{Clock, EventSink, IdGenerator};

/// Scheduled retry entry for the priority queue.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledRound {
    next_run_at: Instant,
    submission_id: SubmissionId,
}

impl PartialOrd for ScheduledRound {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRound {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

struct InMemoryQueueState {
    /// All round records (single source of truth).
    records: HashMap<SubmissionId, RoundRecord>,

    /// Queued rounds in arrival order.
    ready: VecDeque<SubmissionId>,

    /// Retry backoff.
    scheduled: BinaryHeap<ScheduledRound>,

    /// Non-terminal rounds of each task, oldest first. Only the head may run.
    lines: HashMap<TaskId, VecDeque<SubmissionId>>,

    /// Non-terminal submission per round, for duplicate detection.
    pending: HashMap<RoundKey, SubmissionId>,

    attempts: Vec<AttemptRecord>,
    decisions: Vec<DecisionRecord>,

    max_pending: usize,
    max_attempts: u32,
}

impl InMemoryQueueState {
    fn new(max_pending: usize, max_attempts: u32) -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            lines: HashMap::new(),
            pending: HashMap::new(),
            attempts: Vec::new(),
            decisions: Vec::new(),
            max_pending,
            max_attempts,
        }
    }

    /// Move rounds from scheduled to ready if their time has come.
    fn promote_scheduled(&mut self, now: Instant, wall: DateTime<Utc>) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.submission_id)
                && record.state == RoundState::RetryScheduled
            {
                record.requeue(wall);
                self.ready.push_back(entry.submission_id);
            }
        }
    }

    /// Is this submission at the head of its task's line?
    fn heads_its_task(&self, submission_id: SubmissionId) -> bool {
        self.records
            .get(&submission_id)
            .and_then(|record| self.lines.get(&record.request.task))
            .and_then(|line| line.front())
            == Some(&submission_id)
    }

    /// Take the oldest ready round whose task has nothing older pending.
    fn take_runnable(&mut self) -> Option<SubmissionId> {
        let position = self
            .ready
            .iter()
            .position(|id| self.heads_its_task(*id))?;
        self.ready.remove(position)
    }

    fn has_runnable(&self) -> bool {
        self.ready.iter().any(|id| self.heads_its_task(*id))
    }

    /// Drop a finished round from the per-task line and the duplicate index.
    fn retire(&mut self, submission_id: SubmissionId) {
        let Some(record) = self.records.get(&submission_id) else {
            return;
        };
        let key = record.request.key();
        if self.pending.get(&key) == Some(&submission_id) {
            self.pending.remove(&key);
        }
        if let Some(line) = self.lines.get_mut(&key.task) {
            line.retain(|id| *id != submission_id);
            if line.is_empty() {
                self.lines.remove(&key.task);
            }
        }
    }

    fn purge_finished(&mut self, finished_before: DateTime<Utc>) -> usize {
        let expired: Vec<SubmissionId> = self
            .records
            .iter()
            .filter(|(_, r)| r.state.is_terminal() && r.updated_at <= finished_before)
            .map(|(id, _)| *id)
            .collect();
        if expired.is_empty() {
            return 0;
        }
        for id in &expired {
            self.records.remove(id);
        }
        self.attempts.retain(|a| !expired.contains(&a.submission_id));
        self.decisions.retain(|d| !expired.contains(&d.submission_id));
        expired.len()
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            counts.add(record.state);
        }
        counts
    }
}

/// In-memory round queue.
///
/// Bounded by `max_pending` non-terminal rounds. Rounds of one task run one
/// at a time in submission order; a round waiting for a retry keeps later
/// rounds of its task behind it.
pub struct InMemoryRoundQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryRoundQueue {
    pub fn new(config: &QueueConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self::with_decider(
            config,
            Arc::new(DefaultDecider::new(RetryPolicy::rounds())),
            clock,
            ids,
        )
    }

    pub fn with_decider(
        config: &QueueConfig,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::new(
                config.max_pending,
                config.max_attempts,
            ))),
            notify: Arc::new(Notify::new()),
            decider,
            clock,
            ids,
        }
    }

    /// Attempt history of one submission, oldest first.
    pub async fn attempts(&self, submission_id: SubmissionId) -> Vec<AttemptRecord> {
        let state = self.state.lock().await;
        state
            .attempts
            .iter()
            .filter(|a| a.submission_id == submission_id)
            .cloned()
            .collect()
    }

    /// Retry decisions taken for one submission, oldest first.
    pub async fn decisions(&self, submission_id: SubmissionId) -> Vec<DecisionRecord> {
        let state = self.state.lock().await;
        state
            .decisions
            .iter()
            .filter(|d| d.submission_id == submission_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RoundQueue for InMemoryRoundQueue {
    async fn enqueue(&self, request: TaskRequest) -> Result<SubmissionId, QueueError> {
        let key = request.key();
        let submission_id = {
            let mut state = self.state.lock().await;

            if let Some(existing) = state.pending.get(&key) {
                return Err(QueueError::Duplicate {
                    key,
                    existing: *existing,
                });
            }
            if state.pending.len() >= state.max_pending {
                return Err(QueueError::Full {
                    limit: state.max_pending,
                });
            }

            let submission_id = self.ids.generate_submission_id();
            let record =
                RoundRecord::new(submission_id, request, state.max_attempts, self.clock.now());
            state.records.insert(submission_id, record);
            state.ready.push_back(submission_id);
            state
                .lines
                .entry(key.task.clone())
                .or_default()
                .push_back(submission_id);
            state.pending.insert(key.clone(), submission_id);
            submission_id
        };

        info!(submission = %submission_id, round_key = %key, "round enqueued");
        self.notify.notify_one();
        Ok(submission_id)
    }

    async fn lease(&self) -> Option<Box<dyn RoundLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled(Instant::now(), self.clock.now());

                if let Some(submission_id) = state.take_runnable() {
                    let more = state.has_runnable();
                    let now = self.clock.now();
                    if let Some(record) = state.records.get_mut(&submission_id) {
                        record.start_attempt(now);
                        let lease = InMemoryLease {
                            submission_id,
                            request: record.request.clone(),
                            attempt: record.attempts,
                            started_at: now,
                            queue: Arc::clone(&self.state),
                            notify: Arc::clone(&self.notify),
                            decider: Arc::clone(&self.decider),
                            clock: Arc::clone(&self.clock),
                            ids: Arc::clone(&self.ids),
                        };
                        drop(state);
                        // Another worker may be able to take the next one.
                        if more {
                            self.notify.notify_one();
                        }
                        return Some(Box::new(lease));
                    }
                    continue;
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            // Wait for notification OR next scheduled retry.
            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_time) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn status(&self, submission_id: SubmissionId) -> Option<RoundStatus> {
        let state = self.state.lock().await;
        state.records.get(&submission_id).map(RoundStatus::from)
    }

    async fn counts(&self) -> QueueCounts {
        let state = self.state.lock().await;
        state.counts()
    }

    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> usize {
        let purged = self.state.lock().await.purge_finished(finished_before);
        if purged > 0 {
            debug!(purged, %finished_before, "finished rounds purged");
        }
        purged
    }
}

/// Lease implementation for InMemoryRoundQueue.
struct InMemoryLease {
    submission_id: SubmissionId,
    request: TaskRequest,
    attempt: u32,
    started_at: DateTime<Utc>,
    queue: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryLease {
    fn attempt_record(&self, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            attempt_id: self.ids.generate_attempt_id(),
            submission_id: self.submission_id,
            number: self.attempt,
            outcome,
            started_at: self.started_at,
            completed_at: self.clock.now(),
        }
    }
}

#[async_trait]
impl EventSink for InMemoryLease {
    async fn stage_entered(&self, stage: Stage) {
        let mut state = self.queue.lock().await;
        if let Some(record) = state.records.get_mut(&self.submission_id) {
            record.enter_stage(stage, self.clock.now());
        }
        debug!(submission = %self.submission_id, stage = %stage, "stage entered");
    }
}

#[async_trait]
impl RoundLease for InMemoryLease {
    fn submission_id(&self) -> SubmissionId {
        self.submission_id
    }

    fn request(&self) -> &TaskRequest {
        &self.request
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(self: Box<Self>, report: RoundReport) -> Result<(), QueueError> {
        {
            let mut state = self.queue.lock().await;
            let attempt = self.attempt_record(AttemptOutcome::Succeeded);
            state.attempts.push(attempt);

            let now = self.clock.now();
            let record = state
                .records
                .get_mut(&self.submission_id)
                .ok_or(QueueError::Unknown(self.submission_id))?;
            record.mark_succeeded(report, now);
            state.retire(self.submission_id);
        }

        info!(
            submission = %self.submission_id,
            round_key = %self.request.key(),
            attempt = self.attempt,
            "round succeeded"
        );
        // The task's next round (if any) is now at the head of its line.
        self.notify.notify_one();
        Ok(())
    }

    async fn fail(self: Box<Self>, error: &PipelineError) -> Result<(), QueueError> {
        let kind = error.kind();
        let message = error.to_string();

        let decision = {
            let mut state = self.queue.lock().await;
            let attempt = self.attempt_record(AttemptOutcome::Failed {
                error_kind: kind,
                error: message.clone(),
            });
            state.attempts.push(attempt);

            let now = self.clock.now();
            let record = state
                .records
                .get_mut(&self.submission_id)
                .ok_or(QueueError::Unknown(self.submission_id))?;

            let decision = self
                .decider
                .decide(record.attempts, record.max_attempts, kind);
            let trigger = serde_json::json!({
                "error": message,
                "error_kind": kind,
                "attempts": record.attempts,
                "max_attempts": record.max_attempts,
            });

            let decision_record = match &decision {
                Decision::Retry { delay, reason } => {
                    let wall_delay = chrono::Duration::from_std(*delay)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    let next_run_at = now + wall_delay;
                    record.schedule_retry(next_run_at, message.clone(), kind, now);
                    state.scheduled.push(ScheduledRound {
                        next_run_at: Instant::now() + *delay,
                        submission_id: self.submission_id,
                    });
                    DecisionRecord::new(
                        self.submission_id,
                        trigger,
                        "retry_policy",
                        "schedule_retry",
                        Some(serde_json::json!({
                            "delay_secs": delay.as_secs_f64(),
                            "next_run_at": next_run_at,
                            "reason": reason,
                        })),
                        now,
                    )
                }
                Decision::MarkDead { reason } => {
                    record.mark_dead(message.clone(), kind, now);
                    state.retire(self.submission_id);
                    DecisionRecord::new(
                        self.submission_id,
                        trigger,
                        "retry_policy",
                        "mark_dead",
                        Some(serde_json::json!({ "reason": reason })),
                        now,
                    )
                }
            };
            state.decisions.push(decision_record);
            decision
        };

        match &decision {
            Decision::Retry { delay, .. } => warn!(
                submission = %self.submission_id,
                round_key = %self.request.key(),
                attempt = self.attempt,
                error_kind = ?kind,
                error = %message,
                retry_in = ?delay,
                "round failed; retry scheduled"
            ),
            Decision::MarkDead { reason } => warn!(
                submission = %self.submission_id,
                round_key = %self.request.key(),
                attempt = self.attempt,
                error_kind = ?kind,
                error = %message,
                reason = %reason,
                "round failed; marked dead"
            ),
        }

        // Wake a worker: either the retry timer changed or the task's line moved.
        self.notify.notify_one();
        Ok(())
    }
}
