//! Publisher - working directory の中身をタスクの repository に反映する
//!
//! # 方針
//! - round 1 は repository を作る（既にあれば取得して続行）
//! - round > 1 は既存の repository が必須
//! - 1 ファイル = 1 コミット。途中で失敗しても巻き戻さない
//! - 同じ内容で再実行しても update 経路を通るだけで重複しない

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{Commit, Repository, Round, TaskId};
use crate::error::PipelineError;
use crate::ports::{ArtifactStore, FileWrite, StoreError};
use crate::workdir::WorkingDirectory;

pub const LICENSE_FILE: &str = "LICENSE";
pub const README_FILE: &str = "README.md";
pub const LICENSE_TEXT: &str = "MIT License";

pub struct Publisher {
    store: Arc<dyn ArtifactStore>,
    work_root: PathBuf,
}

impl Publisher {
    pub fn new(store: Arc<dyn ArtifactStore>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            work_root: work_root.into(),
        }
    }

    /// Create-or-get on round 1, get-only afterwards.
    pub async fn ensure_repository(
        &self,
        task: &TaskId,
        round: Round,
    ) -> Result<Repository, PipelineError> {
        let name = task.repo_name();

        if round.is_first() {
            match self.store.create_repository(&name).await {
                Ok(repo) => {
                    info!(task = %task, repo = %repo.full_name, "repository created");
                    return Ok(repo);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(task = %task, repo = %name, "repository already exists; reusing it");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store
            .get_repository(&name)
            .await?
            .ok_or_else(|| PipelineError::RepositoryMissing {
                task: task.clone(),
                round,
                repo: name,
            })
    }

    /// Push the working directory to the default branch and return its head.
    pub async fn publish(
        &self,
        task: &TaskId,
        repo: &Repository,
        round: Round,
    ) -> Result<Commit, PipelineError> {
        if round.is_first() {
            self.upsert(repo, LICENSE_FILE, LICENSE_TEXT.as_bytes(), "Add LICENSE")
                .await?;
            self.upsert(repo, README_FILE, readme(task).as_bytes(), "Add README")
                .await?;
        }

        let dir = WorkingDirectory::open(&self.work_root, task).await?;
        let files = dir.files().await?;
        for (name, content) in &files {
            self.upsert(repo, name, content, &format!("Add {name}"))
                .await?;
        }

        let commit = self.store.latest_commit(repo).await?;
        info!(
            task = %task,
            round = %round,
            repo = %repo.full_name,
            files = files.len(),
            commit = %commit.sha,
            "files published"
        );
        Ok(commit)
    }

    /// Update `path` conditionally on its current sha, or create it.
    async fn upsert(
        &self,
        repo: &Repository,
        path: &str,
        content: &[u8],
        create_message: &str,
    ) -> Result<(), StoreError> {
        let existing = self.store.get_file(repo, path).await?;
        let write = match &existing {
            Some(file) => FileWrite {
                path,
                message: format!("Update {path}"),
                content,
                sha: Some(file.sha.as_str()),
            },
            None => FileWrite {
                path,
                message: create_message.to_string(),
                content,
                sha: None,
            },
        };
        debug!(repo = %repo.full_name, path, update = existing.is_some(), "writing file");
        self.store.put_file(repo, write).await
    }
}

/// README committed on round 1.
pub fn readme(task: &TaskId) -> String {
    format!(
        r#"
# {task}

## Summary
This project is an auto-generated web application based on a provided brief.

## Setup
To run this application, simply open the `index.html` file in your web browser.

## Code Explanation
The `index.html` file contains the entire application, including the HTML structure, CSS styling, and JavaScript logic.

## License
This project is licensed under the MIT License.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::impls::InMemoryArtifactStore;

    struct Fixture {
        _root: tempfile::TempDir,
        store: Arc<InMemoryArtifactStore>,
        publisher: Publisher,
        task: TaskId,
    }

    async fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryArtifactStore::new("octo"));
        let publisher = Publisher::new(store.clone(), root.path());
        let task = TaskId::new("counter").unwrap();
        let dir = WorkingDirectory::open(root.path(), &task).await.unwrap();
        dir.write_document("<h1>v1</h1>").await.unwrap();
        dir.write_attachment("data.csv", b"a,b").await.unwrap();
        Fixture {
            _root: root,
            store,
            publisher,
            task,
        }
    }

    #[tokio::test]
    async fn first_round_creates_repository_and_bootstrap_files() {
        let f = fixture().await;

        let repo = f
            .publisher
            .ensure_repository(&f.task, Round::FIRST)
            .await
            .unwrap();
        assert_eq!(repo.full_name, "octo/task-counter");

        let commit = f.publisher.publish(&f.task, &repo, Round::FIRST).await.unwrap();

        assert_eq!(
            f.store.file_text("task-counter", LICENSE_FILE).as_deref(),
            Some("MIT License")
        );
        let readme = f.store.file_text("task-counter", README_FILE).unwrap();
        assert!(readme.contains("# counter"));
        assert_eq!(
            f.store.file_text("task-counter", "index.html").as_deref(),
            Some("<h1>v1</h1>")
        );
        assert_eq!(
            f.store.file_text("task-counter", "data.csv").as_deref(),
            Some("a,b")
        );
        assert_eq!(
            f.store.commit_messages("task-counter"),
            vec!["Add LICENSE", "Add README", "Add data.csv", "Add index.html"]
        );
        assert_eq!(commit, f.store.head("task-counter").unwrap());
    }

    #[tokio::test]
    async fn creating_an_existing_repository_reuses_it() {
        let f = fixture().await;
        f.store.create_repository("task-counter").await.unwrap();

        let repo = f
            .publisher
            .ensure_repository(&f.task, Round::FIRST)
            .await
            .unwrap();
        assert_eq!(repo.name, "task-counter");
        assert_eq!(f.store.repository_count(), 1);
    }

    #[tokio::test]
    async fn later_round_requires_existing_repository() {
        let f = fixture().await;

        let err = f
            .publisher
            .ensure_repository(&f.task, Round::new(2).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RepositoryMissing { .. }));
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(f.store.repository_count(), 0);
    }

    #[tokio::test]
    async fn republishing_updates_instead_of_duplicating() {
        let f = fixture().await;
        let repo = f
            .publisher
            .ensure_repository(&f.task, Round::FIRST)
            .await
            .unwrap();
        f.publisher.publish(&f.task, &repo, Round::FIRST).await.unwrap();

        let round2 = Round::new(2).unwrap();
        let repo = f.publisher.ensure_repository(&f.task, round2).await.unwrap();
        f.publisher.publish(&f.task, &repo, round2).await.unwrap();

        let messages = f.store.commit_messages("task-counter");
        assert_eq!(
            &messages[4..],
            &["Update data.csv".to_string(), "Update index.html".to_string()]
        );
        assert_eq!(f.store.file_count("task-counter"), 4);
    }
}
