//! ArtifactStore port - タスクごとのリモート repository
//!
//! pipeline が必要とする最小限の操作だけを持ちます:
//! create / get / read-file / write-file / latest-commit
//!
//! # 実装
//! - `impls::github::GitHubClient`（本番用）
//! - `impls::inmem_store::InMemoryArtifactStore`（開発用・テスト用）

use async_trait::async_trait;

use crate::domain::{Commit, ErrorKind, RemoteFile, Repository};

/// StoreError は artifact store の操作エラー
///
/// `AlreadyExists` と `NotFound` は store 側が名前を付けて返す条件で、
/// 呼び出し側がステータスコードを覗く必要はありません。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("repository '{0}' already exists")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("artifact store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("artifact store request failed: {0}")]
    Transport(String),

    #[error("unexpected artifact store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Transport(_) => ErrorKind::Transient,
            StoreError::Status { status, .. } => ErrorKind::from_status(*status),
            StoreError::AlreadyExists(_) | StoreError::NotFound(_) | StoreError::Decode(_) => {
                ErrorKind::Permanent
            }
        }
    }
}

/// A file write against the default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    pub message: String,
    pub content: &'a [u8],
    /// `Some(sha)` updates the existing file conditionally; `None` creates it.
    pub sha: Option<&'a str>,
}

/// ArtifactStore は 1 task = 1 repository のリモート版管理ストア
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create a public repository. Must return `StoreError::AlreadyExists`
    /// when the name is taken.
    async fn create_repository(&self, name: &str) -> Result<Repository, StoreError>;

    /// `Ok(None)` when no repository has that name.
    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError>;

    /// File at the head of the default branch, `Ok(None)` when absent.
    async fn get_file(&self, repo: &Repository, path: &str)
    -> Result<Option<RemoteFile>, StoreError>;

    /// Create or conditionally update one file; each call is its own commit.
    async fn put_file(&self, repo: &Repository, write: FileWrite<'_>) -> Result<(), StoreError>;

    /// Most recent commit on the default branch.
    async fn latest_commit(&self, repo: &Repository) -> Result<Commit, StoreError>;
}
