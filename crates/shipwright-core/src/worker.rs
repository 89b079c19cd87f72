use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info_span};

use crate::app::Pipeline;
use crate::queue::RoundQueue;

/// Worker group handle.
/// - `request_shutdown()` でワーカー全体が新しい lease を取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers. At most `n` rounds run at the same time.
    pub fn spawn(n: usize, queue: Arc<dyn RoundQueue>, pipeline: Arc<Pipeline>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let p = Arc::clone(&pipeline);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, p, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers.
    /// In-flight rounds are not cancelled; workers just stop taking new leases.
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn RoundQueue>,
    pipeline: Arc<Pipeline>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つ可能性があるので select で shutdown と競合させる
        let lease = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        // pipeline 実行に必要な分だけ owned にする（queue のロックは lease() 内で完結）
        let request = lease.request().clone();
        let span = info_span!(
            "round",
            worker = worker_id,
            submission = %lease.submission_id(),
            attempt = lease.attempt(),
        );

        async {
            let result = pipeline.run(&request, &*lease).await;
            match result {
                Ok(report) => {
                    if let Err(e) = lease.ack(report).await {
                        error!(error = %e, "ack failed");
                    }
                }
                Err(err) => {
                    if let Err(e) = lease.fail(&err).await {
                        error!(error = %e, "fail report failed");
                    }
                }
            }
        }
        .instrument(span)
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::app::{ContentGenerator, HostingPublisher, Notifier, Publisher};
    use crate::config::QueueConfig;
    use crate::domain::{Round, TaskId, TaskRequest};
    use crate::impls::InMemoryArtifactStore;
    use crate::ports::{Clock, FixedClock, UlidGenerator};
    use crate::queue::{InMemoryRoundQueue, RoundState};
    use crate::testing::{RecordingCallback, ScriptedGenerator};

    fn request(task: &str, round: u32) -> TaskRequest {
        TaskRequest {
            task: TaskId::new(task).unwrap(),
            brief: "brief".into(),
            attachments: vec![],
            round: Round::new(round).unwrap(),
            evaluation_url: None,
            nonce: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn workers_drain_the_queue_and_stop_on_shutdown() {
        let root = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let store = Arc::new(InMemoryArtifactStore::new("octo"));
        let pipeline = Arc::new(Pipeline::new(
            ContentGenerator::new(
                Arc::new(ScriptedGenerator::always(r#"{"html": "<p>ok</p>"}"#)),
                root.path(),
            ),
            Publisher::new(store.clone(), root.path()),
            HostingPublisher::new(store.clone(), Arc::clone(&clock), Duration::ZERO),
            Notifier::new(Arc::new(RecordingCallback::always(200)), Arc::clone(&clock)),
        ));
        let queue = Arc::new(InMemoryRoundQueue::new(
            &QueueConfig::default(),
            Arc::clone(&clock),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        ));

        let first = queue.enqueue(request("alpha", 1)).await.unwrap();
        let second = queue.enqueue(request("alpha", 2)).await.unwrap();
        let other = queue.enqueue(request("beta", 1)).await.unwrap();

        let workers = WorkerGroup::spawn(2, queue.clone(), pipeline);

        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.counts().await.succeeded < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("all rounds should finish");

        workers.shutdown_and_join().await;

        for id in [first, second, other] {
            assert_eq!(queue.status(id).await.unwrap().state, RoundState::Succeeded);
        }
        assert_eq!(store.repository_count(), 2);
    }
}
