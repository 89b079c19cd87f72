//! Pipeline - 1 round を最後まで流す
//!
//! generate → ensure_repository → publish → enable_hosting → notify
//!
//! generate と publish の失敗は `PipelineError` として返す（queue が retry を判断）。
//! hosting と notify は劣化するだけで失敗しない。

use tracing::{info, instrument};

use super::generator::ContentGenerator;
use super::hosting::HostingPublisher;
use super::notifier::Notifier;
use super::publisher::Publisher;
use crate::domain::{NotificationPayload, RoundReport, Stage, TaskRequest};
use crate::error::PipelineError;
use crate::ports::EventSink;

pub struct Pipeline {
    generator: ContentGenerator,
    publisher: Publisher,
    hosting: HostingPublisher,
    notifier: Notifier,
}

impl Pipeline {
    pub fn new(
        generator: ContentGenerator,
        publisher: Publisher,
        hosting: HostingPublisher,
        notifier: Notifier,
    ) -> Self {
        Self {
            generator,
            publisher,
            hosting,
            notifier,
        }
    }

    /// Run one round, reporting each stage to `sink`.
    #[instrument(skip_all, fields(task = %request.task, round = %request.round))]
    pub async fn run<S>(&self, request: &TaskRequest, sink: &S) -> Result<RoundReport, PipelineError>
    where
        S: EventSink + ?Sized,
    {
        sink.stage_entered(Stage::Received).await;

        sink.stage_entered(Stage::Generating).await;
        let document = self.generator.generate(request).await?;

        sink.stage_entered(Stage::Publishing).await;
        let repo = self
            .publisher
            .ensure_repository(&request.task, request.round)
            .await?;
        let commit = self
            .publisher
            .publish(&request.task, &repo, request.round)
            .await?;

        sink.stage_entered(Stage::Hosting).await;
        let pages_url = self.hosting.enable_hosting(&repo).await;

        sink.stage_entered(Stage::Notifying).await;
        let payload = NotificationPayload {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: repo.html_url.clone(),
            commit_sha: commit.sha.clone(),
            pages_url: pages_url.clone(),
            evaluation_url: request.evaluation_url.clone(),
        };
        let notified = self.notifier.notify(&payload).await;

        sink.stage_entered(Stage::Done).await;
        info!(
            repo = %repo.full_name,
            commit = %commit.sha,
            pages_url = pages_url.as_deref().unwrap_or("-"),
            notified,
            fallback = document.fallback,
            "round complete"
        );

        Ok(RoundReport {
            repo_url: repo.html_url,
            commit_sha: commit.sha,
            pages_url,
            notified,
            fallback_document: document.fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::{Attachment, ErrorKind, FALLBACK_PAGE, Round, TaskId};
    use crate::impls::InMemoryArtifactStore;
    use crate::ports::{FixedClock, GenerationError};
    use crate::testing::{RecordingCallback, RecordingSink, ScriptedGenerator};

    struct Harness {
        _root: tempfile::TempDir,
        store: Arc<InMemoryArtifactStore>,
        callback: Arc<RecordingCallback>,
        pipeline: Pipeline,
    }

    fn harness(generator: ScriptedGenerator) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryArtifactStore::new("octo"));
        let callback = Arc::new(RecordingCallback::always(200));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let pipeline = Pipeline::new(
            ContentGenerator::new(Arc::new(generator), root.path()),
            Publisher::new(store.clone(), root.path()),
            HostingPublisher::new(store.clone(), clock.clone(), Duration::from_secs(10)),
            Notifier::new(callback.clone(), clock),
        );
        Harness {
            _root: root,
            store,
            callback,
            pipeline,
        }
    }

    fn request(round: u32) -> TaskRequest {
        TaskRequest {
            task: TaskId::new("quiz").unwrap(),
            brief: "A quiz page".into(),
            attachments: vec![Attachment::new("q.json", "data:application/json;base64,e30=")],
            round: Round::new(round).unwrap(),
            evaluation_url: Some("http://eval.local/notify".into()),
            nonce: Some("nonce-7".into()),
            email: Some("me@example.com".into()),
        }
    }

    #[tokio::test]
    async fn first_round_runs_every_stage_and_notifies() {
        let h = harness(ScriptedGenerator::always(r#"{"html": "<h1>quiz</h1>"}"#));
        let sink = RecordingSink::default();

        let report = h.pipeline.run(&request(1), &sink).await.unwrap();

        assert_eq!(
            sink.stages(),
            vec![
                Stage::Received,
                Stage::Generating,
                Stage::Publishing,
                Stage::Hosting,
                Stage::Notifying,
                Stage::Done,
            ]
        );
        assert_eq!(report.repo_url, "https://github.com/octo/task-quiz");
        assert_eq!(report.commit_sha, h.store.head("task-quiz").unwrap().sha);
        assert_eq!(report.pages_url.as_deref(), Some("https://octo.github.io/task-quiz/"));
        assert!(report.notified);
        assert!(!report.fallback_document);
        assert_eq!(h.store.file_text("task-quiz", "q.json").as_deref(), Some("{}"));

        let calls = h.callback.calls();
        assert_eq!(calls.len(), 1);
        let body = &calls[0].1;
        assert_eq!(body["task"], "quiz");
        assert_eq!(body["round"], 1);
        assert_eq!(body["nonce"], "nonce-7");
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(body["commit_sha"], report.commit_sha.as_str());
        assert_eq!(body["repo_url"], "https://github.com/octo/task-quiz");
        assert!(body.get("evaluation_url").is_none());
    }

    #[tokio::test]
    async fn revision_round_reuses_repository() {
        let h = harness(ScriptedGenerator::sequence(vec![
            Ok(Some(r#"{"html": "<h1>v1</h1>"}"#.into())),
            Ok(Some(r#"{"html": "<h1>v2</h1>"}"#.into())),
        ]));
        h.pipeline
            .run(&request(1), &RecordingSink::default())
            .await
            .unwrap();

        let report = h
            .pipeline
            .run(&request(2), &RecordingSink::default())
            .await
            .unwrap();

        assert_eq!(h.store.repository_count(), 1);
        assert_eq!(
            h.store.file_text("task-quiz", "index.html").as_deref(),
            Some("<h1>v2</h1>")
        );
        assert_eq!(report.commit_sha, h.store.head("task-quiz").unwrap().sha);
        let body = &h.callback.calls()[1].1;
        assert_eq!(body["round"], 2);
    }

    #[tokio::test]
    async fn revision_without_repository_fails_permanently_before_hosting() {
        let h = harness(ScriptedGenerator::always(r#"{"html": "<p>x</p>"}"#));
        let sink = RecordingSink::default();

        let err = h.pipeline.run(&request(2), &sink).await.unwrap_err();

        assert!(matches!(err, PipelineError::RepositoryMissing { .. }));
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(sink.stages().last(), Some(&Stage::Publishing));
        assert!(h.callback.calls().is_empty());
    }

    #[tokio::test]
    async fn generation_outage_is_transient_and_publishes_nothing() {
        let h = harness(ScriptedGenerator::sequence(vec![Err(
            GenerationError::Status {
                status: 503,
                body: "overloaded".into(),
            },
        )]));

        let err = h
            .pipeline
            .run(&request(1), &RecordingSink::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(h.store.repository_count(), 0);
    }

    #[tokio::test]
    async fn hosting_outage_degrades_to_no_pages_url() {
        let h = harness(ScriptedGenerator::always("not json at all"));
        h.store.set_hosting_down(true);

        let report = h
            .pipeline
            .run(&request(1), &RecordingSink::default())
            .await
            .unwrap();

        assert_eq!(report.pages_url, None);
        assert!(report.fallback_document);
        assert_eq!(
            h.store.file_text("task-quiz", "index.html").as_deref(),
            Some(FALLBACK_PAGE)
        );
        assert!(report.notified);
        assert_eq!(h.callback.calls()[0].1["pages_url"], serde_json::Value::Null);
    }
}
