//! AppBuilder - 設定から pipeline と queue を組み立てる
//!
//! 何も差し替えなければ本番用の実装（OpenAI / GitHub / HTTP callback / SystemClock）
//! を使う。テストや開発では port ごとに差し替えられる。

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{ContentGenerator, GcLoop, HostingPublisher, Notifier, Pipeline, Publisher};
use crate::config::Config;
use crate::impls::{GitHubClient, HttpCallbackClient, OpenAiChatService};
use crate::ports::{
    ArtifactStore, CallbackClient, Clock, GenerationService, HostingApi, SystemClock,
    UlidGenerator,
};
use crate::queue::{InMemoryRoundQueue, RoundQueue};
use crate::worker::WorkerGroup;

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(Config::from_env()?)
///     .artifact_store(store.clone(), store)
///     .build();
/// let workers = app.spawn_workers();
/// ```
pub struct AppBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    generation: Option<Arc<dyn GenerationService>>,
    store: Option<(Arc<dyn ArtifactStore>, Arc<dyn HostingApi>)>,
    callback: Option<Arc<dyn CallbackClient>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
            generation: None,
            store: None,
            callback: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn generation_service(mut self, service: Arc<dyn GenerationService>) -> Self {
        self.generation = Some(service);
        self
    }

    /// Replace the repository store and the hosting API together; they are
    /// two views of the same remote.
    pub fn artifact_store(
        mut self,
        store: Arc<dyn ArtifactStore>,
        hosting: Arc<dyn HostingApi>,
    ) -> Self {
        self.store = Some((store, hosting));
        self
    }

    pub fn callback_client(mut self, client: Arc<dyn CallbackClient>) -> Self {
        self.callback = Some(client);
        self
    }

    pub fn build(self) -> App {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let generation = self
            .generation
            .unwrap_or_else(|| Arc::new(OpenAiChatService::new(&config.openai)));
        let (store, hosting) = self.store.unwrap_or_else(|| {
            let github = Arc::new(GitHubClient::new(&config.github));
            (github.clone() as Arc<dyn ArtifactStore>, github as Arc<dyn HostingApi>)
        });
        let callback = self
            .callback
            .unwrap_or_else(|| Arc::new(HttpCallbackClient::new()));

        let pipeline = Pipeline::new(
            ContentGenerator::new(generation, &config.work_root),
            Publisher::new(store, &config.work_root),
            HostingPublisher::new(hosting, Arc::clone(&clock), config.pages_settle),
            Notifier::new(callback, Arc::clone(&clock)),
        );
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let queue = InMemoryRoundQueue::new(&config.queue, Arc::clone(&clock), ids);

        info!(
            workers = config.queue.workers,
            max_pending = config.queue.max_pending,
            max_attempts = config.queue.max_attempts,
            work_root = %config.work_root.display(),
            "app built"
        );

        App {
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            clock,
            workers: config.queue.workers,
            retention: config.queue.retention,
        }
    }
}

/// App は queue と pipeline を持つ。front door は queue に積み、worker が流す。
pub struct App {
    pub queue: Arc<dyn RoundQueue>,
    pub pipeline: Arc<Pipeline>,
    clock: Arc<dyn Clock>,
    workers: usize,
    retention: Duration,
}

impl App {
    pub fn spawn_workers(&self) -> WorkerGroup {
        WorkerGroup::spawn(
            self.workers,
            Arc::clone(&self.queue),
            Arc::clone(&self.pipeline),
        )
    }

    /// Start expiring finished rounds after the configured retention.
    pub fn spawn_gc(&self) -> GcLoop {
        GcLoop::spawn(
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
            self.retention,
        )
    }
}
