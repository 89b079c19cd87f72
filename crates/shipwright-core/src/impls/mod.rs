//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **OpenAiChatService**: OpenAI 互換 Chat Completions（GenerationService）
//! - **GitHubClient**: GitHub REST API（ArtifactStore + HostingApi）
//! - **HttpCallbackClient**: 評価サービスへの POST（CallbackClient）
//! - **InMemoryArtifactStore**: 開発用・テスト用（ArtifactStore + HostingApi）

pub mod github;
pub mod http_callback;
pub mod inmem_store;
pub mod openai;

// 主要な型を再エクスポート
pub use self::github::GitHubClient;
pub use self::http_callback::HttpCallbackClient;
pub use self::inmem_store::InMemoryArtifactStore;
pub use self::openai::OpenAiChatService;
