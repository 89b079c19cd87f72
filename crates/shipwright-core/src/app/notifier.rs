//! Notifier - 評価サービスへ完了を知らせる
//!
//! 2xx が返るまで最大 4 回 POST する。間隔は `RetryPolicy::notification()`
//! (1s, 2s, 4s)。最後の試行の後は待たない。全部失敗しても round は成功扱い。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::NotificationPayload;
use crate::ports::{CallbackClient, Clock};
use crate::queue::RetryPolicy;

pub const NOTIFY_ATTEMPTS: u32 = 4;

pub struct Notifier {
    client: Arc<dyn CallbackClient>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    max_attempts: u32,
}

impl Notifier {
    pub fn new(client: Arc<dyn CallbackClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            policy: RetryPolicy::notification(),
            max_attempts: NOTIFY_ATTEMPTS,
        }
    }

    /// Deliver the payload. Returns whether the evaluator acknowledged it.
    pub async fn notify(&self, payload: &NotificationPayload) -> bool {
        let Some(url) = payload.evaluation_url.as_deref() else {
            debug!(task = %payload.task, round = %payload.round, "no evaluation url; skipping notification");
            return false;
        };
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(task = %payload.task, error = %e, "notification payload could not be encoded");
                return false;
            }
        };

        for attempt in 1..=self.max_attempts {
            match self.client.post_json(url, &body).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!(task = %payload.task, round = %payload.round, attempt, "evaluation notified");
                    return true;
                }
                Ok(status) => {
                    warn!(task = %payload.task, round = %payload.round, attempt, status, "evaluation callback rejected notification");
                }
                Err(e) => {
                    warn!(task = %payload.task, round = %payload.round, attempt, error = %e, "evaluation callback failed");
                }
            }
            if attempt < self.max_attempts {
                self.clock.sleep(self.policy.next_delay(attempt)).await;
            }
        }

        warn!(
            task = %payload.task,
            round = %payload.round,
            attempts = self.max_attempts,
            "giving up on evaluation notification"
        );
        false
    }
}
