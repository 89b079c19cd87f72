//! Task request model: what the front door hands to the pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

const MAX_TASK_ID_LEN: usize = 100;

/// Stable identifier of a logical task, reused across rounds.
///
/// Restricted to `[A-Za-z0-9._-]` because it names both the local working
/// directory and the remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Result<Self, RequestError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_TASK_ID_LEN {
            return Err(RequestError::InvalidTaskId(value));
        }
        if value == "." || value == ".." {
            return Err(RequestError::InvalidTaskId(value));
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
        if !value.chars().all(allowed) {
            return Err(RequestError::InvalidTaskId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name shared by the working directory and the remote repository.
    pub fn repo_name(&self) -> String {
        format!("task-{}", self.0)
    }
}

impl TryFrom<String> for TaskId {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Round number: 1 bootstraps a task, anything above revises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Round(u32);

impl Round {
    pub const FIRST: Round = Round(1);

    pub fn new(value: u32) -> Result<Self, RequestError> {
        if value == 0 {
            return Err(RequestError::InvalidRound(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_first(self) -> bool {
        self.0 == 1
    }
}

impl TryFrom<u32> for Round {
    type Error = RequestError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Round> for u32 {
    fn from(round: Round) -> Self {
        round.0
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `(task, round)` pair; identifies one iteration of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundKey {
    pub task: TaskId,
    pub round: Round,
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.task, self.round)
    }
}

/// An inline attachment: `url` is a data URI (`"<header>,<base64-payload>"`).
///
/// Both fields are optional on the wire; incomplete attachments are skipped
/// by the generator rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
        }
    }

    /// Decode the base64 payload after the first comma of the data URI.
    pub fn decode(&self) -> Result<Vec<u8>, AttachmentError> {
        let url = self.url.as_deref().ok_or(AttachmentError::MissingPayload)?;
        let (_header, encoded) = url.split_once(',').ok_or(AttachmentError::NotDataUri)?;
        BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| AttachmentError::InvalidBase64(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment has no payload")]
    MissingPayload,

    #[error("attachment url is not a data URI")]
    NotDataUri,

    #[error("attachment payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Validation errors for inbound requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid task id '{0}'")]
    InvalidTaskId(String),

    #[error("invalid round {0}: rounds start at 1")]
    InvalidRound(u32),
}

/// The request body as it arrives on `POST /api/request`.
///
/// Everything is optional here; `TaskRequest::try_from` decides what is
/// required. `secret` is consumed by the front door and never reaches the
/// pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
    #[serde(default)]
    pub nonce: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Attachment>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Attachment>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validated task request for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task: TaskId,
    pub brief: String,
    pub attachments: Vec<Attachment>,
    pub round: Round,
    pub evaluation_url: Option<String>,
    /// Opaque, echoed back in the notification as received.
    pub nonce: Option<Value>,
    /// Opaque, echoed back in the notification as received.
    pub email: Option<Value>,
}

impl TaskRequest {
    pub fn key(&self) -> RoundKey {
        RoundKey {
            task: self.task.clone(),
            round: self.round,
        }
    }
}

impl TryFrom<SubmitRequest> for TaskRequest {
    type Error = RequestError;

    fn try_from(raw: SubmitRequest) -> Result<Self, Self::Error> {
        let task = TaskId::new(raw.task.ok_or(RequestError::MissingField("task"))?)?;
        let round = Round::new(raw.round.ok_or(RequestError::MissingField("round"))?)?;
        let brief = raw.brief.ok_or(RequestError::MissingField("brief"))?;
        // An empty string is treated the same as an absent callback.
        let evaluation_url = raw.evaluation_url.filter(|url| !url.trim().is_empty());

        Ok(Self {
            task,
            brief,
            attachments: raw.attachments,
            round,
            evaluation_url,
            nonce: raw.nonce,
            email: raw.email,
        })
    }
}
