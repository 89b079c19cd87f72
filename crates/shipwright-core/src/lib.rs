//! shipwright-core
//!
//! Core building blocks for the shipwright service: a task brief goes in, a
//! generated single-page app comes out as a published repository with static
//! hosting, and the evaluator is told where to find it.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, state, outcome, repository, notification, attempt, decision, errors）
//! - **ports**: 抽象化レイヤー（GenerationService, ArtifactStore, HostingApi, CallbackClient, Clock, IdGenerator, EventSink）
//! - **app**: アプリケーションロジック（generator, publisher, hosting, notifier, pipeline, builder）
//! - **impls**: 実装（OpenAI, GitHub, HTTP callback, InMemoryArtifactStore）
//! - **queue**: round queue（lease / ack / fail, retry, per-task serialization）
//! - **worker**: bounded worker group
//! - **workdir**: task ごとの作業ディレクトリ
//! - **config**: 環境変数からの設定
//! - **observability**: status views
//! - **error**: PipelineError

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod workdir;
pub mod worker;

#[cfg(test)]
mod testing;
