//! HostingPublisher - repository の default branch を Pages で公開する
//!
//! 失敗しても round は止めない。URL が取れなければ `None` を返すだけ。

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::Repository;
use crate::ports::{Clock, HostingApi};

pub struct HostingPublisher {
    api: Arc<dyn HostingApi>,
    clock: Arc<dyn Clock>,
    /// Pause after a fresh enable so the first deployment can start.
    settle: Duration,
}

impl HostingPublisher {
    pub fn new(api: Arc<dyn HostingApi>, clock: Arc<dyn Clock>, settle: Duration) -> Self {
        Self { api, clock, settle }
    }

    /// Enable hosting, or read the existing configuration when it is already on.
    pub async fn enable_hosting(&self, repo: &Repository) -> Option<String> {
        match self.api.enable(repo).await {
            Ok(Some(url)) => {
                info!(repo = %repo.full_name, url = %url, "hosting enabled");
                self.clock.sleep(self.settle).await;
                return Some(url);
            }
            Ok(None) => {
                self.clock.sleep(self.settle).await;
            }
            Err(e) => {
                info!(repo = %repo.full_name, reason = %e, "hosting not newly enabled; reading status");
            }
        }

        match self.api.status(repo).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                warn!(repo = %repo.full_name, "hosting status carried no URL");
                None
            }
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "hosting unavailable; continuing without a pages URL");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryArtifactStore;
    use crate::ports::{ArtifactStore, FixedClock};
    use chrono::Utc;

    async fn setup() -> (Arc<InMemoryArtifactStore>, Arc<FixedClock>, HostingPublisher, Repository) {
        let store = Arc::new(InMemoryArtifactStore::new("octo"));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let hosting = HostingPublisher::new(store.clone(), clock.clone(), Duration::from_secs(10));
        let repo = store.create_repository("task-site").await.unwrap();
        (store, clock, hosting, repo)
    }

    #[tokio::test]
    async fn fresh_enable_waits_then_returns_url() {
        let (_store, clock, hosting, repo) = setup().await;

        let url = hosting.enable_hosting(&repo).await;

        assert_eq!(url.as_deref(), Some("https://octo.github.io/task-site/"));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn already_enabled_reads_status_without_waiting() {
        let (_store, clock, hosting, repo) = setup().await;
        hosting.enable_hosting(&repo).await;

        let url = hosting.enable_hosting(&repo).await;

        assert_eq!(url.as_deref(), Some("https://octo.github.io/task-site/"));
        assert_eq!(clock.sleeps().len(), 1, "only the first enable waits");
    }

    #[tokio::test]
    async fn unavailable_hosting_yields_none() {
        let (store, clock, hosting, repo) = setup().await;
        store.set_hosting_down(true);

        assert_eq!(hosting.enable_hosting(&repo).await, None);
        assert!(clock.sleeps().is_empty());
    }
}
