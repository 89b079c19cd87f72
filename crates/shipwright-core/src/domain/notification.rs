//! Notification payload sent to the evaluation callback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::{Round, TaskId};

/// Completion report for one round.
///
/// `evaluation_url` is where the payload goes, not part of it: it is never
/// serialized, so the POST body is the payload minus the callback address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: Option<Value>,
    pub task: TaskId,
    pub round: Round,
    pub nonce: Option<Value>,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: Option<String>,
    #[serde(skip)]
    pub evaluation_url: Option<String>,
}
