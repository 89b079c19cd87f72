use thiserror::Error;

use crate::domain::{ErrorKind, Round, TaskId};
use crate::ports::{GenerationError, StoreError};
use crate::workdir::WorkdirError;

/// Failure that stops a round before it is published.
///
/// Hosting and notification problems never show up here; those stages
/// degrade instead of failing.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("round {round} of task '{task}' requires existing repository '{repo}'")]
    RepositoryMissing {
        task: TaskId,
        round: Round,
        repo: String,
    },

    #[error(transparent)]
    Workdir(#[from] WorkdirError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Generation(e) => e.kind(),
            PipelineError::Store(e) => e.kind(),
            PipelineError::RepositoryMissing { .. } => ErrorKind::Permanent,
            PipelineError::Workdir(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_component_error() {
        let transport = PipelineError::from(GenerationError::Transport("reset".into()));
        assert_eq!(transport.kind(), ErrorKind::Transient);

        let missing = PipelineError::RepositoryMissing {
            task: TaskId::new("t").unwrap(),
            round: Round::new(2).unwrap(),
            repo: "task-t".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::Permanent);
        assert!(missing.to_string().contains("task-t"));

        let forbidden = PipelineError::from(StoreError::Status {
            status: 403,
            message: "Resource not accessible".into(),
        });
        assert_eq!(forbidden.kind(), ErrorKind::Permanent);
    }
}
