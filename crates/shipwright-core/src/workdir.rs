//! Working directory: the local, per-task staging area.
//!
//! `<work_root>/task-{id}/` holds the decoded attachments and the current
//! `index.html`. It outlives a round so the next round can read the previous
//! document. The queue never runs two rounds of one task at the same time, so
//! nothing here locks.

use std::path::{Path, PathBuf};

use crate::domain::{ErrorKind, TaskId};

/// File name of the generated page.
pub const DOCUMENT_FILE: &str = "index.html";

#[derive(Debug, thiserror::Error)]
pub enum WorkdirError {
    #[error("'{0}' is not a plain file name")]
    InvalidName(String),

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkdirError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkdirError::InvalidName(_) => ErrorKind::Permanent,
            WorkdirError::Io { .. } => ErrorKind::Infrastructure,
        }
    }
}

/// Handle on one task's staging directory.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Open (creating if needed) the directory for `task` under `root`.
    pub async fn open(root: &Path, task: &TaskId) -> Result<Self, WorkdirError> {
        let path = root.join(task.repo_name());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| WorkdirError::Io {
                action: "create",
                path: path.clone(),
                source,
            })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an attachment under its declared name.
    ///
    /// The name must be a single path component; anything that could escape
    /// the directory is refused.
    pub async fn write_attachment(&self, name: &str, bytes: &[u8]) -> Result<(), WorkdirError> {
        let target = self.child(name)?;
        write(&target, bytes).await
    }

    /// The current document, `None` if no round has produced one yet.
    pub async fn read_document(&self) -> Result<Option<String>, WorkdirError> {
        let path = self.path.join(DOCUMENT_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WorkdirError::Io {
                action: "read",
                path,
                source,
            }),
        }
    }

    /// Replace the current document.
    pub async fn write_document(&self, html: &str) -> Result<(), WorkdirError> {
        write(&self.path.join(DOCUMENT_FILE), html.as_bytes()).await
    }

    /// Every regular file in the directory, sorted by name.
    pub async fn files(&self) -> Result<Vec<(String, Vec<u8>)>, WorkdirError> {
        let io_err = |action, path: &Path| {
            let path = path.to_path_buf();
            move |source| WorkdirError::Io {
                action,
                path,
                source,
            }
        };

        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(io_err("list", &self.path))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_err("list", &self.path))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(io_err("stat", &entry.path()))?;
            if !file_type.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            let bytes = tokio::fs::read(entry.path())
                .await
                .map_err(io_err("read", &entry.path()))?;
            files.push((name, bytes));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    fn child(&self, name: &str) -> Result<PathBuf, WorkdirError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !plain {
            return Err(WorkdirError::InvalidName(name.to_string()));
        }
        Ok(self.path.join(name))
    }
}

async fn write(path: &Path, bytes: &[u8]) -> Result<(), WorkdirError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| WorkdirError::Io {
            action: "write",
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn open_temp() -> (tempfile::TempDir, WorkingDirectory) {
        let root = tempfile::tempdir().unwrap();
        let task = TaskId::new("sample").unwrap();
        let dir = WorkingDirectory::open(root.path(), &task).await.unwrap();
        (root, dir)
    }

    #[tokio::test]
    async fn directory_is_keyed_by_task() {
        let (root, dir) = open_temp().await;
        assert_eq!(dir.path(), root.path().join("task-sample"));
        assert!(dir.path().is_dir());
    }

    #[tokio::test]
    async fn document_round_trips_and_is_replaced() {
        let (_root, dir) = open_temp().await;
        assert_eq!(dir.read_document().await.unwrap(), None);

        dir.write_document("<p>one</p>").await.unwrap();
        dir.write_document("<p>two</p>").await.unwrap();

        assert_eq!(
            dir.read_document().await.unwrap().as_deref(),
            Some("<p>two</p>")
        );
    }

    #[tokio::test]
    async fn files_lists_attachments_and_document_sorted() {
        let (_root, dir) = open_temp().await;
        dir.write_attachment("data.csv", b"a,b").await.unwrap();
        dir.write_document("<html></html>").await.unwrap();
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();

        let files = dir.files().await.unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["data.csv", "index.html"]);
        assert_eq!(files[0].1, b"a,b");
    }

    #[rstest]
    #[case::empty("")]
    #[case::dot(".")]
    #[case::parent("..")]
    #[case::traversal("../escape.txt")]
    #[case::nested("dir/file.txt")]
    #[case::backslash("dir\\file.txt")]
    #[tokio::test]
    async fn unsafe_attachment_names_are_refused(#[case] name: &str) {
        let (_root, dir) = open_temp().await;
        let err = dir.write_attachment(name, b"x").await.unwrap_err();
        assert!(matches!(err, WorkdirError::InvalidName(_)));
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }
}
