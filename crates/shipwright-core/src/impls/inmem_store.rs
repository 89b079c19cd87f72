//! InMemoryArtifactStore - 開発用・テスト用の artifact store + hosting
//!
//! GitHub と同じ約束事を守ります:
//! - 同名 repository の作成は `StoreError::AlreadyExists`
//! - 既存ファイルへの書き込みには現在の sha が必要
//! - 書き込み 1 回 = コミット 1 つ
//! - hosting の enable は初回だけ成功し、2 回目以降は status で URL を読む

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Commit, RemoteFile, Repository};
use crate::ports::{ArtifactStore, FileWrite, HostingApi, HostingError, StoreError};

#[derive(Debug, Default)]
struct StoredRepo {
    repo: Option<Repository>,
    files: BTreeMap<String, (String, Vec<u8>)>,
    commits: Vec<(Commit, String)>,
    pages_url: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    repos: HashMap<String, StoredRepo>,
    seq: u64,
    hosting_down: bool,
}

impl StoreState {
    fn next_sha(&mut self) -> String {
        self.seq += 1;
        format!("{:040x}", self.seq)
    }
}

/// InMemoryArtifactStore は 1 プロセス内だけで完結する store
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    owner: String,
    state: Mutex<StoreState>,
}

impl InMemoryArtifactStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A poisoned lock only means a panicking test; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every hosting call fail with a transport error.
    pub fn set_hosting_down(&self, down: bool) {
        self.lock().hosting_down = down;
    }

    pub fn repository_count(&self) -> usize {
        self.lock().repos.len()
    }

    pub fn file_count(&self, repo: &str) -> usize {
        self.lock().repos.get(repo).map_or(0, |r| r.files.len())
    }

    pub fn file_text(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let (_, bytes) = state.repos.get(repo)?.files.get(path)?;
        String::from_utf8(bytes.clone()).ok()
    }

    /// Commit messages on the default branch, oldest first.
    pub fn commit_messages(&self, repo: &str) -> Vec<String> {
        self.lock()
            .repos
            .get(repo)
            .map(|r| r.commits.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    pub fn head(&self, repo: &str) -> Option<Commit> {
        self.lock()
            .repos
            .get(repo)
            .and_then(|r| r.commits.last().map(|(c, _)| c.clone()))
    }

    pub fn pages_url(&self, repo: &str) -> Option<String> {
        self.lock().repos.get(repo).and_then(|r| r.pages_url.clone())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn create_repository(&self, name: &str) -> Result<Repository, StoreError> {
        let mut state = self.lock();
        if state.repos.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        let repo = Repository {
            name: name.to_string(),
            full_name: format!("{}/{}", self.owner, name),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
        };
        state.repos.insert(
            name.to_string(),
            StoredRepo {
                repo: Some(repo.clone()),
                ..StoredRepo::default()
            },
        );
        Ok(repo)
    }

    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError> {
        Ok(self.lock().repos.get(name).and_then(|r| r.repo.clone()))
    }

    async fn get_file(
        &self,
        repo: &Repository,
        path: &str,
    ) -> Result<Option<RemoteFile>, StoreError> {
        let state = self.lock();
        let stored = state
            .repos
            .get(&repo.name)
            .ok_or_else(|| StoreError::NotFound(repo.full_name.clone()))?;
        Ok(stored.files.get(path).map(|(sha, _)| RemoteFile {
            path: path.to_string(),
            sha: sha.clone(),
        }))
    }

    async fn put_file(&self, repo: &Repository, write: FileWrite<'_>) -> Result<(), StoreError> {
        let mut state = self.lock();
        let blob_sha = state.next_sha();
        let commit_sha = state.next_sha();
        let stored = state
            .repos
            .get_mut(&repo.name)
            .ok_or_else(|| StoreError::NotFound(repo.full_name.clone()))?;

        let current = stored.files.get(write.path).map(|(sha, _)| sha.as_str());
        match (current, write.sha) {
            (Some(_), None) => {
                return Err(StoreError::Status {
                    status: 422,
                    message: format!("\"sha\" wasn't supplied for {}", write.path),
                });
            }
            (Some(current), Some(expected)) if current != expected => {
                return Err(StoreError::Status {
                    status: 409,
                    message: format!("{} does not match {expected}", write.path),
                });
            }
            (None, Some(_)) => return Err(StoreError::NotFound(write.path.to_string())),
            _ => {}
        }

        stored
            .files
            .insert(write.path.to_string(), (blob_sha, write.content.to_vec()));
        stored.commits.push((Commit { sha: commit_sha }, write.message));
        Ok(())
    }

    async fn latest_commit(&self, repo: &Repository) -> Result<Commit, StoreError> {
        let state = self.lock();
        let stored = state
            .repos
            .get(&repo.name)
            .ok_or_else(|| StoreError::NotFound(repo.full_name.clone()))?;
        stored
            .commits
            .last()
            .map(|(commit, _)| commit.clone())
            .ok_or_else(|| StoreError::Status {
                status: 409,
                message: "Git Repository is empty.".into(),
            })
    }
}

#[async_trait]
impl HostingApi for InMemoryArtifactStore {
    async fn enable(&self, repo: &Repository) -> Result<Option<String>, HostingError> {
        let mut state = self.lock();
        if state.hosting_down {
            return Err(HostingError::Transport("hosting unavailable".into()));
        }
        let owner = self.owner.clone();
        let stored = state
            .repos
            .get_mut(&repo.name)
            .ok_or(HostingError::Status { status: 404 })?;
        if stored.pages_url.is_some() {
            return Err(HostingError::Status { status: 409 });
        }
        let url = format!("https://{}.github.io/{}/", owner, repo.name);
        stored.pages_url = Some(url.clone());
        Ok(Some(url))
    }

    async fn status(&self, repo: &Repository) -> Result<Option<String>, HostingError> {
        let state = self.lock();
        if state.hosting_down {
            return Err(HostingError::Transport("hosting unavailable".into()));
        }
        match state.repos.get(&repo.name).and_then(|r| r.pages_url.clone()) {
            Some(url) => Ok(Some(url)),
            None => Err(HostingError::Status { status: 404 }),
        }
    }
}
