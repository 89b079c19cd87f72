//! HostingApi port - 静的ホスティング（GitHub Pages）

use async_trait::async_trait;

use crate::domain::Repository;

#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// Enable was refused, typically because hosting is already on.
    #[error("hosting request returned {status}")]
    Status { status: u16 },

    #[error("hosting request failed: {0}")]
    Transport(String),
}

/// HostingApi は default branch の root を公開する
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Enable hosting from the default branch, root path. `Ok` only when it
    /// was newly enabled, carrying the URL from that response.
    async fn enable(&self, repo: &Repository) -> Result<Option<String>, HostingError>;

    /// Read the existing hosting configuration's URL.
    async fn status(&self, repo: &Repository) -> Result<Option<String>, HostingError>;
}
