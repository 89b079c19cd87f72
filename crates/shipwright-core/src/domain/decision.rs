//! Decision model: what to do with a round after a failed attempt.
//!
//! The pipeline only classifies its failure (`ErrorKind`); whether that means
//! "try again later" or "give up" is decided here, away from the call site
//! that failed.

use std::time::Duration;

use super::errors::ErrorKind;
use crate::queue::RetryPolicy;

/// The next action to take for a failed round.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run the round again after a delay.
    Retry { delay: Duration, reason: String },

    /// Give up; the round is dead.
    MarkDead { reason: String },
}

/// Decides the next action from attempt counts and the failure kind.
///
/// Deciders are pure: they return the action, the queue applies it.
pub trait Decider: Send + Sync {
    /// # Arguments
    /// * `attempts` - attempts already made, including the failed one (1-indexed)
    /// * `max_attempts` - attempt budget of the submission
    /// * `kind` - classification of the failure
    fn decide(&self, attempts: u32, max_attempts: u32, kind: ErrorKind) -> Decision;
}

/// Retry retryable failures with exponential backoff until the budget is
/// spent; permanent failures are dead immediately.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, attempts: u32, max_attempts: u32, kind: ErrorKind) -> Decision {
        if !kind.is_retryable() {
            return Decision::MarkDead {
                reason: format!("{kind:?} failure is not retried"),
            };
        }
        if attempts >= max_attempts {
            return Decision::MarkDead {
                reason: format!("Max attempts reached: {attempts}/{max_attempts}"),
            };
        }
        let delay = self.retry_policy.next_delay(attempts);
        Decision::Retry {
            delay,
            reason: format!(
                "Retry attempt {}/{} after {:?}",
                attempts + 1,
                max_attempts,
                delay
            ),
        }
    }
}
