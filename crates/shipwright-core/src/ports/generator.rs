//! GenerationService port - LLM への 1 回の問い合わせ
//!
//! 実装: `impls::openai::OpenAiChatService`

use async_trait::async_trait;

use crate::domain::ErrorKind;

/// One chat-style generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Transport or availability failure of the generation service.
///
/// Content-shape problems are NOT errors at this level: the service returns
/// whatever text it got (or `None`) and the content generator decides.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Transport(_) => ErrorKind::Transient,
            GenerationError::Status { status, .. } => ErrorKind::from_status(*status),
        }
    }
}

/// GenerationService は指示文を送り、返ってきた本文をそのまま返す
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// `Ok(None)` means the service answered but carried no content.
    async fn complete(&self, request: &GenerationRequest)
    -> Result<Option<String>, GenerationError>;
}
