//! CallbackClient port - 評価サービスへの POST

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("callback request failed: {0}")]
    Transport(String),
}

/// CallbackClient は JSON body を POST して HTTP status を返す
#[async_trait]
pub trait CallbackClient: Send + Sync {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, CallbackError>;
}
