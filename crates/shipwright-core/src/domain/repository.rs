//! Remote repository handles returned by the artifact store.

use serde::{Deserialize, Serialize};

/// Branch every file operation, commit lookup and Pages source uses.
pub const DEFAULT_BRANCH: &str = "main";

/// A task's remote repository (one per task, reused across rounds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Short name, `task-{id}`.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Browser URL reported to the evaluator.
    pub html_url: String,
}

/// A file that exists at the head of the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    /// Content hash; required for a conditional update.
    pub sha: String,
}

/// A commit on the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
}
